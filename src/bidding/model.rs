use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 상품(경매) 모델
#[derive(Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    pub current_price: i64,
    pub current_bidder_id: Option<i64>,
    pub buy_now_price: i64,
    pub bid_increment: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seller: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// 입찰 모델
#[derive(Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub product_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
    pub auto_bid: bool,
    pub bid_time: DateTime<Utc>,
}

// 상품 요약(입찰 이력 응답에 함께 내려가는 정보)
#[derive(Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: i64,
    pub title: String,
    pub current_price: i64,
    pub current_bidder_id: Option<i64>,
    pub status: String,
    pub end_time: DateTime<Utc>,
}

// 자동 입찰 상한 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct AutoBid {
    pub product_id: i64,
    pub bidder_id: i64,
    pub max_amount: i64,
    pub updated_at: DateTime<Utc>,
}
