/// 상품 조회
pub const GET_PRODUCT: &str =
    "SELECT id, title, description, starting_price, current_price, current_bidder_id, buy_now_price, bid_increment, start_time, end_time, seller, status, created_at FROM products WHERE id = $1";

/// 모든 상품 조회
pub const GET_ALL_PRODUCTS: &str =
    "SELECT id, title, description, starting_price, current_price, current_bidder_id, buy_now_price, bid_increment, start_time, end_time, seller, status, created_at FROM products ORDER BY created_at DESC";

/// 상품 요약 조회(입찰 이력 응답용)
pub const GET_PRODUCT_SUMMARY: &str =
    "SELECT id, title, current_price, current_bidder_id, status, end_time FROM products WHERE id = $1";

/// 입찰 이력 조회(시간순, 추가 전용)
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, product_id, bidder_id, bid_amount, auto_bid, bid_time
    FROM bids
    WHERE product_id = $1
    ORDER BY bid_time, id
"#;

/// 상품의 자동 입찰 상한 전체 조회(연쇄 계산용)
pub const GET_PRODUCT_AUTO_BIDS: &str = r#"
    SELECT product_id, bidder_id, max_amount, updated_at
    FROM auto_bids
    WHERE product_id = $1
    ORDER BY updated_at
"#;

/// 입찰자의 자동 입찰 상한 조회
pub const GET_AUTO_BID: &str = r#"
    SELECT product_id, bidder_id, max_amount, updated_at
    FROM auto_bids
    WHERE product_id = $1 AND bidder_id = $2
"#;

/// 상품 현재 가격 조회
pub const GET_PRODUCT_CURRENT_PRICE: &str = "SELECT current_price FROM products WHERE id = $1";

/// 상품 버전 조회
pub const GET_PRODUCT_VERSION: &str = "SELECT COALESCE(MAX(version), 0) as version FROM events WHERE aggregate_id = $1";
