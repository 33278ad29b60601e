use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 입찰 이벤트(수동/자동 입찰 공통)
    BidPlaced {
        product_id: i64,
        bidder_id: i64,
        bid_amount: i64,
        auto_bid: bool,
        timestamp: DateTime<Utc>,
    },
    // 자동 입찰 상한 등록/갱신 이벤트
    AutoBidRegistered {
        product_id: i64,
        bidder_id: i64,
        max_amount: i64,
        timestamp: DateTime<Utc>,
    },
    // 즉시 구매 이벤트
    BuyNowExecuted {
        product_id: i64,
        buyer_id: i64,
        price: i64,
        timestamp: DateTime<Utc>,
    },
}
