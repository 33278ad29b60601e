// region:    --- Imports
use crate::account::{AccountClient, AccountInfo};
use crate::bidding::commands::{
    handle_place_bid, handle_register_auto_bid, PlaceBidCommand, RegisterAutoBidCommand,
};
use crate::database::DatabaseManager;
use crate::event_store::PostgresEventStore;
use crate::message_broker::KafkaProducer;
use crate::query;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State
/// 라우터 공유 상태
pub type AppState = (Arc<DatabaseManager>, Arc<KafkaProducer>, Arc<AccountClient>);
// endregion: --- App State

// region:    --- Request Payloads
/// 입찰 요청 본문(입찰자는 베어러 토큰으로 식별)
#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub bid_amount: i64,
    pub max_auto_bid: Option<i64>,
}

/// 자동 입찰 상한 요청 본문
#[derive(Debug, Deserialize)]
pub struct AutoBidRequest {
    pub max_amount: i64,
}
// endregion: --- Request Payloads

// region:    --- Auth

/// 베어러 토큰을 계정 서비스에 검증하고 입찰자 계정을 얻는다
async fn authorize(
    account_client: &AccountClient,
    headers: &HeaderMap,
) -> Result<AccountInfo, Response> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(authorization) = authorization else {
        return Err((
            axum::http::StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "인증 토큰이 없습니다.",
                "code": "UNAUTHORIZED"
            })),
        )
            .into_response());
    };

    match account_client.verify_bearer(authorization).await {
        Ok(account) => Ok(account),
        Err(e) => Err((
            axum::http::StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": e,
                "code": "UNAUTHORIZED"
            })),
        )
            .into_response()),
    }
}

// endregion: --- Auth

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_bid(
    State((db_manager, kafka_producer, account_client)): State<AppState>,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<BidRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 입찰 요청 처리 시작: product {} {:?}",
        "Command", product_id, payload
    );

    // 입찰자 식별
    let account = match authorize(&account_client, &headers).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    // 현재 가격 조회
    let current_price =
        match query::handlers::get_product_current_price(&db_manager, product_id).await {
            Ok(price) => price,
            Err(e) => {
                return (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(e.to_string()),
                )
                    .into_response()
            }
        };

    // 입찰 가격이 현재 가격보다 높은지 검증
    if payload.bid_amount <= current_price {
        return (
            axum::http::StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "입찰 가격은 현재 가격보다 높아야 합니다.",
                "code": "LOW_BID",
                "current_price": current_price
            })),
        )
            .into_response();
    }

    // 이벤트 저장소 생성
    let event_store = PostgresEventStore::new(db_manager.get_pool(), Arc::clone(&kafka_producer));

    let cmd = PlaceBidCommand {
        product_id,
        bidder_id: account.id,
        bid_amount: payload.bid_amount,
        max_auto_bid: payload.max_auto_bid,
    };
    let bid_amount = cmd.bid_amount;

    // 입찰 처리
    match handle_place_bid(cmd, &event_store, &db_manager).await {
        Ok(placed) => {
            let auto_bid_count = placed.iter().filter(|b| b.auto_bid).count();
            let final_price = placed.last().map(|b| b.bid_amount).unwrap_or(bid_amount);
            (
                axum::http::StatusCode::OK,
                Json(serde_json::json!({
                    "message": "입찰이 성공적으로 처리되었습니다.",
                    "bid_amount": bid_amount,
                    "auto_bids_triggered": auto_bid_count,
                    "current_price": final_price
                })),
            )
                .into_response()
        }
        Err(e) => (axum::http::StatusCode::BAD_REQUEST, Json(e)).into_response(),
    }
}

/// 자동 입찰 상한 등록/갱신 요청 처리
pub async fn handle_update_auto_bid(
    State((db_manager, kafka_producer, account_client)): State<AppState>,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
    Json(payload): Json<AutoBidRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 자동 입찰 상한 요청 처리 시작: product {} {:?}",
        "Command", product_id, payload
    );

    // 입찰자 식별
    let account = match authorize(&account_client, &headers).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    // 이벤트 저장소 생성
    let event_store = PostgresEventStore::new(db_manager.get_pool(), Arc::clone(&kafka_producer));

    let cmd = RegisterAutoBidCommand {
        product_id,
        bidder_id: account.id,
        max_amount: payload.max_amount,
    };

    // 상한 등록 처리
    match handle_register_auto_bid(cmd, &event_store, &db_manager).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "message": "자동 입찰 상한이 등록되었습니다.",
                "max_amount": payload.max_amount
            })),
        )
            .into_response(),
        Err(e) => (axum::http::StatusCode::BAD_REQUEST, Json(e)).into_response(),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 입찰자 본인의 자동 입찰 상한 조회
pub async fn handle_get_auto_bid(
    State((db_manager, _, account_client)): State<AppState>,
    Path(product_id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 자동 입찰 상한 조회 id: {}",
        "HandlerQuery", product_id
    );

    let account = match authorize(&account_client, &headers).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    match query::handlers::get_auto_bid(&db_manager, product_id, account.id).await {
        Ok(Some(auto_bid)) => Json(auto_bid).into_response(),
        Ok(None) => (
            axum::http::StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "등록된 자동 입찰 상한이 없습니다.",
                "code": "NOT_FOUND"
            })),
        )
            .into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 입찰 이력 조회(상품 요약 포함, 시간순)
pub async fn handle_get_bid_history(
    State((db_manager, _, _)): State<AppState>,
    Path(product_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 입찰 이력 조회 id: {}",
        "HandlerQuery", product_id
    );
    let summary = match query::handlers::get_product_summary(&db_manager, product_id).await {
        Ok(summary) => summary,
        Err(e) => {
            return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    };
    match query::handlers::get_bid_history(&db_manager, product_id).await {
        Ok(history) => Json(serde_json::json!({
            "product": summary,
            "bids": history
        }))
        .into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 모든 상품 조회
pub async fn handle_get_products(
    State((db_manager, _, _)): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 모든 상품 조회", "HandlerQuery");
    match query::handlers::get_all_products(&db_manager).await {
        Ok(products) => Json(products).into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 상품 조회
pub async fn handle_get_product(
    State((db_manager, _, _)): State<AppState>,
    Path(product_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 상품 조회 id: {}", "HandlerQuery", product_id);
    match query::handlers::get_product(&db_manager, product_id).await {
        Ok(product) => Json(product).into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// endregion: --- Query Handlers
