//! 통합 테스트
//! 로컬에서 서버(:3000), Postgres, Kafka가 떠 있어야 한다.
//! 서버는 ACCOUNT_SERVICE_URL=http://127.0.0.1:4100 으로 실행한다
//! (테스트 바이너리가 4100 포트에 모의 계정 서비스를 띄운다).
use axum::extract::Json as AxumJson;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bid_service::bidding::model::Product;
use bid_service::database::DatabaseManager;
use bid_service::query;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::json;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// 트레이싱 초기화
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("트레이싱 구독자 설정 실패");
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    ensure_mock_account_service();
    Arc::new(DatabaseManager::new().await)
}

/// 테스트용 베어러 토큰(모의 계정 서비스가 buyer-<id> 형식을 해석)
fn bearer(buyer_id: i64) -> String {
    format!("Bearer buyer-{}", buyer_id)
}

// region:    --- Mock Account Service

/// 모의 계정 서비스의 토큰 검증 핸들러
async fn mock_verify(headers: HeaderMap) -> axum::response::Response {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    match authorization
        .strip_prefix("Bearer buyer-")
        .and_then(|id| id.parse::<i64>().ok())
    {
        Some(id) => AxumJson(json!({"id": id, "username": format!("buyer{}", id)})).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            AxumJson(json!({"error": "invalid token"})),
        )
            .into_response(),
    }
}

/// 4100 포트에 모의 계정 서비스를 프로세스당 한 번 띄운다
fn ensure_mock_account_service() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        std::thread::spawn(|| {
            let rt = tokio::runtime::Runtime::new().expect("모의 계정 서비스 런타임 생성 실패");
            rt.block_on(async {
                let app = Router::new().route("/api/auth/verify", get(mock_verify));
                let listener = tokio::net::TcpListener::bind("127.0.0.1:4100")
                    .await
                    .expect("모의 계정 서비스 바인드 실패");
                axum::serve(listener, app.into_make_service())
                    .await
                    .expect("모의 계정 서비스 실행 실패");
            });
        });
        // 리스너가 준비될 때까지 잠시 대기
        std::thread::sleep(std::time::Duration::from_millis(200));
    });
}

// endregion: --- Mock Account Service

/// 입찰 테스트
#[tokio::test]
async fn test_place_bid() {
    let db_manager = setup().await;
    let client = Client::new();

    // 테스트용 상품 생성
    let product = create_test_product(
        &db_manager,
        "입찰 테스트 상품".to_string(),
        "입찰 기능 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    // 입찰 요청 생성
    let bid_data = json!({ "bid_amount": product.current_price + 1000 });

    // 입찰 처리
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(1))
        .json(&bid_data)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    // 이벤트 처리 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    // 데이터베이스에서 업데이트된 상품 조회
    let updated_product = query::handlers::get_product(&db_manager, product.id)
        .await
        .unwrap();
    assert_eq!(updated_product.current_price, product.current_price + 1000);
    assert_eq!(updated_product.current_bidder_id, Some(1));
}

/// 현재 가격 이하의 입찰은 항상 거부된다
#[tokio::test]
async fn test_reject_low_bid() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "하향 입찰 거부 테스트 상품".to_string(),
        "현재 가격 이하 입찰 거부 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    // 현재 가격과 같은 금액으로 입찰
    let bid_data = json!({ "bid_amount": product.current_price });

    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(1))
        .json(&bid_data)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error_info: Value = response.json().await.unwrap();
    assert_eq!(error_info["code"], "LOW_BID");

    // 이력이 비어 있는지 확인
    let history = query::handlers::get_bid_history(&db_manager, product.id)
        .await
        .unwrap();
    assert!(history.is_empty());
}

/// 토큰이 없으면 입찰이 거부된다
#[tokio::test]
async fn test_unauthorized_bid() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "인증 테스트 상품".to_string(),
        "인증 없는 입찰 거부 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    let bid_data = json!({ "bid_amount": product.current_price + 1000 });

    // Authorization 헤더 없이 요청
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .json(&bid_data)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// 자동 입찰 연쇄 테스트: 추월당한 상한 보유자가 대리 입찰로 재역전한다
#[tokio::test]
async fn test_auto_bid_cascade() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "자동 입찰 테스트 상품".to_string(),
        "자동 입찰 연쇄 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    // 1번 입찰자: 11,000 입찰 + 상한 20,000 등록
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(1))
        .json(&json!({ "bid_amount": 11_000, "max_auto_bid": 20_000 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    // 2번 입찰자: 12,000 입찰 -> 1번의 대리인이 13,000으로 재역전
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(2))
        .json(&json!({ "bid_amount": 12_000 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["auto_bids_triggered"], 1);

    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    // 최종 상태: 1번 입찰자가 13,000으로 선두
    let updated_product = query::handlers::get_product(&db_manager, product.id)
        .await
        .unwrap();
    assert_eq!(updated_product.current_price, 13_000);
    assert_eq!(updated_product.current_bidder_id, Some(1));

    // 이력: 시간순 3건, 마지막은 자동 입찰
    let history = query::handlers::get_bid_history(&db_manager, product.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.iter().map(|b| b.bid_amount).collect::<Vec<_>>(),
        vec![11_000, 12_000, 13_000]
    );
    assert!(history[2].auto_bid);
    assert_eq!(history[2].bidder_id, 1);
}

/// 자동 입찰 금액은 저장된 상한을 절대 초과하지 않는다
#[tokio::test]
async fn test_auto_bid_ceiling_never_exceeded() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "상한 보존 테스트 상품".to_string(),
        "자동 입찰 상한 보존 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    // 2번 입찰자: 상한 15,000 등록
    let response = client
        .put(format!(
            "http://localhost:3000/api/bid/{}/autoBid",
            product.id
        ))
        .header("Authorization", bearer(2))
        .json(&json!({ "max_amount": 15_000 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    // 등록된 상한 조회
    let response = client
        .get(format!(
            "http://localhost:3000/api/bid/{}/autobid",
            product.id
        ))
        .header("Authorization", bearer(2))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let ceiling: Value = response.json().await.unwrap();
    assert_eq!(ceiling["max_amount"], 15_000);

    // 3번 입찰자: 14,500 입찰 -> 2번의 대리인이 상한(15,000)까지만 재역전
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(3))
        .json(&json!({ "bid_amount": 14_500 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let history = query::handlers::get_bid_history(&db_manager, product.id)
        .await
        .unwrap();
    for bid in history.iter().filter(|b| b.bidder_id == 2) {
        assert!(
            bid.bid_amount <= 15_000,
            "자동 입찰 {}가 상한 15000을 초과",
            bid.bid_amount
        );
    }

    let updated_product = query::handlers::get_product(&db_manager, product.id)
        .await
        .unwrap();
    assert_eq!(updated_product.current_price, 15_000);
    assert_eq!(updated_product.current_bidder_id, Some(2));
}

/// 상한 등록은 갱신(upsert)이다
#[tokio::test]
async fn test_update_auto_bid_upsert() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "상한 갱신 테스트 상품".to_string(),
        "자동 입찰 상한 갱신 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    for max_amount in [12_000i64, 18_000] {
        let response = client
            .put(format!(
                "http://localhost:3000/api/bid/{}/autoBid",
                product.id
            ))
            .header("Authorization", bearer(5))
            .json(&json!({ "max_amount": max_amount }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;
    }

    // 마지막 값으로 갱신되었는지 확인
    let ceiling = query::handlers::get_auto_bid(&db_manager, product.id, 5)
        .await
        .unwrap()
        .expect("상한이 저장되지 않음");
    assert_eq!(ceiling.max_amount, 18_000);
}

/// 즉시 구매 가격 이상의 입찰은 낙찰 처리된다
#[tokio::test]
async fn test_bid_at_buy_now_price_completes_auction() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "즉시 구매 테스트 상품".to_string(),
        "즉시 구매 가격 입찰 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(7))
        .json(&json!({ "bid_amount": product.buy_now_price }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let updated_product = query::handlers::get_product(&db_manager, product.id)
        .await
        .unwrap();
    assert_eq!(updated_product.status, "COMPLETED");
    assert_eq!(updated_product.current_price, product.buy_now_price);
    assert_eq!(updated_product.current_bidder_id, Some(7));
}

/// 입찰 이력은 시간순이며 추가 전용이다
#[tokio::test]
async fn test_bid_history_chronological_and_append_only() {
    let db_manager = setup().await;
    let client = Client::new();

    let product = create_test_product(
        &db_manager,
        "이력 테스트 상품".to_string(),
        "입찰 이력 정렬/추가 전용 테스트를 위한 상품입니다.".to_string(),
    )
    .await;

    // 두 번의 입찰 후 이력 스냅샷
    for (buyer, amount) in [(1i64, 11_000i64), (2, 12_000)] {
        let response = client
            .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
            .header("Authorization", bearer(buyer))
            .json(&json!({ "bid_amount": amount }))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());
        tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;
    }

    let response = client
        .get(format!(
            "http://localhost:3000/api/bid/{}/historyBid",
            product.id
        ))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let first_snapshot: Value = response.json().await.unwrap();
    let first_bids = first_snapshot["bids"].as_array().unwrap().clone();
    assert_eq!(first_snapshot["product"]["id"], product.id);

    // 추가 입찰 후 다시 조회
    let response = client
        .post(format!("http://localhost:3000/api/bid/{}/bid", product.id))
        .header("Authorization", bearer(3))
        .json(&json!({ "bid_amount": 13_000 }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    tokio::time::sleep(tokio::time::Duration::from_millis(1500)).await;

    let response = client
        .get(format!(
            "http://localhost:3000/api/bid/{}/historyBid",
            product.id
        ))
        .send()
        .await
        .expect("Failed to send request");
    let second_snapshot: Value = response.json().await.unwrap();
    let second_bids = second_snapshot["bids"].as_array().unwrap();

    // 기존 이력은 그대로 유지되고 뒤에만 추가된다
    assert_eq!(&second_bids[..first_bids.len()], &first_bids[..]);

    // 시간순(오름차순) 정렬 확인
    let amounts: Vec<i64> = second_bids
        .iter()
        .map(|b| b["bid_amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![11_000, 12_000, 13_000]);
}

/// 동시성 입찰 테스트
#[tokio::test]
async fn test_concurrent_bidding() {
    // 테스트 시작 시 tracing 초기화
    init_tracing();

    let db_manager = setup().await;

    // 3개의 테스트용 상품 생성
    let products = create_multiple_test_products(&db_manager, 3).await;

    // 각 상품에 대해 동시 입찰 생성 및 처리
    for (index, product) in products.iter().enumerate() {
        info!("상품 {} 테스트 시작", index + 1);

        // 50개의 동시 입찰 생성
        let mut handles = vec![];
        for i in 1..=50 {
            let client = reqwest::Client::new();
            let bid_amount = product.current_price + i * 1000;
            let product_id = product.id;

            let handle = tokio::spawn(async move {
                let bid_data = serde_json::json!({ "bid_amount": bid_amount });

                // POST 요청 전송
                let response = client
                    .post(format!("http://{}/api/bid/{}/bid", "127.0.0.1:3000", product_id))
                    .header("Content-Type", "application/json")
                    .header("Authorization", bearer(i))
                    .json(&bid_data)
                    .send()
                    .await
                    .unwrap();

                let status = response.status();
                let body = response.text().await.unwrap();

                (status, body)
            });

            handles.push(handle);
        }

        // 모든 입찰 처리 대기 및 결과 확인
        let mut successful_bids = 0;
        let mut failed_bids = 0;
        for handle in handles {
            let (status, body) = handle.await.unwrap();

            if status == StatusCode::OK {
                successful_bids += 1;
            } else if status == StatusCode::BAD_REQUEST {
                let error_info: Value = serde_json::from_str(&body).unwrap();
                if error_info["code"] == "MAX_RETRIES_EXCEEDED" {
                    error!("최대 재시도 횟수 초과 오류 발생: {:?}", error_info);
                    panic!("최대 재시도 횟수 초과 오류 발생");
                } else {
                    failed_bids += 1;
                }
            }
        }

        info!(
            "상품 {}: 성공한 입찰 수: {}, 실패한 입찰 수: {}",
            index + 1,
            successful_bids,
            failed_bids
        );

        // 이벤트 처리 대기
        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        // 최종 상태 확인
        let updated_product = query::handlers::get_product(&db_manager, product.id)
            .await
            .unwrap();
        assert_eq!(
            updated_product.current_price,
            product.current_price + 50000,
            "상품 {}: 예상 가격: {}, 실제 가격: {}",
            index + 1,
            product.current_price + 50000,
            updated_product.current_price
        );
        assert_eq!(updated_product.current_bidder_id, Some(50));

        // 입찰 이력 확인
        let bid_history = query::handlers::get_bid_history(&db_manager, product.id)
            .await
            .unwrap();
        info!("상품 {}: 총 입찰 수: {}", index + 1, bid_history.len());

        // 버전 확인
        let final_version = query::handlers::get_product_version(&db_manager, product.id)
            .await
            .unwrap();
        assert!(final_version >= 1);
    }
}

// 여러 개의 테스트 상품을 생성하는 함수
async fn create_multiple_test_products(db_manager: &DatabaseManager, count: usize) -> Vec<Product> {
    let mut products = Vec::with_capacity(count);
    for i in 1..=count {
        let product = create_test_product(
            db_manager,
            format!("동시성 입찰 테스트 상품 {}", i),
            format!("동시성 입찰 기능 테스트를 위한 상품 {}입니다.", i),
        )
        .await;
        products.push(product);
    }
    products
}

/// 테스트용 상품 생성
async fn create_test_product(
    db_manager: &DatabaseManager,
    title: String,
    description: String,
) -> Product {
    db_manager.transaction(|tx| Box::pin(async move {
        sqlx::query_as::<_, Product>(
            "INSERT INTO products (title, description, starting_price, current_price, buy_now_price, bid_increment, start_time, end_time, seller, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING *"
        )
        .bind(&title)
        .bind(&description)
        .bind(10000)
        .bind(10000)
        .bind(500000)
        .bind(1000)
        .bind(Utc::now())
        .bind(Utc::now() + Duration::hours(2))
        .bind("TestSeller")
        .bind("ACTIVE")
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await
    })).await.unwrap()
}
