// region:    --- Imports
use super::queries;
use crate::bidding::model::{AutoBid, Bid, Product, ProductSummary};
use crate::database::DatabaseManager;
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 상품 조회
pub async fn get_product(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<Product, SqlxError> {
    info!("{:<12} --> 상품 조회 id: {}", "Query", product_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Product>(queries::GET_PRODUCT)
                    .bind(product_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
}

/// 모든 상품 조회
pub async fn get_all_products(db_manager: &DatabaseManager) -> Result<Vec<Product>, SqlxError> {
    info!("{:<12} --> 모든 상품 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Product>(queries::GET_ALL_PRODUCTS)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 상품 요약 조회
pub async fn get_product_summary(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<ProductSummary, SqlxError> {
    info!("{:<12} --> 상품 요약 조회 id: {}", "Query", product_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, ProductSummary>(queries::GET_PRODUCT_SUMMARY)
                    .bind(product_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 이력 조회(시간순)
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", product_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                    .bind(product_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 상품의 자동 입찰 상한 전체 조회
pub async fn get_product_auto_bids(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<Vec<AutoBid>, SqlxError> {
    info!(
        "{:<12} --> 자동 입찰 상한 전체 조회 id: {}",
        "Query", product_id
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, AutoBid>(queries::GET_PRODUCT_AUTO_BIDS)
                    .bind(product_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰자의 자동 입찰 상한 조회
pub async fn get_auto_bid(
    db_manager: &DatabaseManager,
    product_id: i64,
    bidder_id: i64,
) -> Result<Option<AutoBid>, SqlxError> {
    info!(
        "{:<12} --> 자동 입찰 상한 조회 id: {} bidder: {}",
        "Query", product_id, bidder_id
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, AutoBid>(queries::GET_AUTO_BID)
                    .bind(product_id)
                    .bind(bidder_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 상품 현재 가격 조회
pub async fn get_product_current_price(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<i64, SqlxError> {
    info!("{:<12} --> 상품 현재 가격 조회 id: {}", "Query", product_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_PRODUCT_CURRENT_PRICE)
                    .bind(product_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("current_price"))
            })
        })
        .await
}

/// 상품 버전 조회
pub async fn get_product_version(
    db_manager: &DatabaseManager,
    product_id: i64,
) -> Result<i64, SqlxError> {
    info!("{:<12} --> 상품 이벤트 버전 조회 id: {}", "Query", product_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_PRODUCT_VERSION)
                    .bind(product_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("version"))
            })
        })
        .await
}

// endregion: --- Query Handlers
