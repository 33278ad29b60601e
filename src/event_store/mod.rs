// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::message_broker::{KafkaConsumer, KafkaProducer, EVENTS_TOPIC};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- Event Model
/// 이벤트 저장소에 저장되는 이벤트 모델
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Event {
    pub id: i64,
    pub aggregate_id: i64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: i64,
}
// endregion: --- Event Model

// region:    --- Event Store Trait
/// 이벤트 저장소 트레이트
#[async_trait]
pub trait EventStore {
    async fn append_and_publish_event(&self, event: Event) -> Result<(), String>;
    /// 연속 버전의 이벤트 배치를 전부 저장하거나 전부 취소한다
    async fn append_and_publish_events(&self, events: Vec<Event>) -> Result<(), String>;
}

/// 이벤트 저장소 구현체
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
    kafka_producer: Arc<KafkaProducer>,
}

/// 이벤트 저장소 구현체 메서드 구현
#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append_and_publish_event(&self, event: Event) -> Result<(), String> {
        self.append_and_publish_events(vec![event]).await
    }

    async fn append_and_publish_events(&self, events: Vec<Event>) -> Result<(), String> {
        let mut tx = self.pool.begin().await.map_err(|e| e.to_string())?;

        let mut stored = Vec::with_capacity(events.len());
        for mut event in events {
            let event_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO events (aggregate_id, event_type, data, timestamp, version)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (aggregate_id, version) DO NOTHING
                RETURNING id",
            )
            .bind(event.aggregate_id)
            .bind(&event.event_type)
            .bind(&event.data)
            .bind(event.timestamp)
            .bind(event.version)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| e.to_string())?;

            match event_id {
                Some(id) => {
                    event.id = id;
                    stored.push(event);
                }
                None => {
                    // 동일 버전이 먼저 기록됨: 배치 전체 취소
                    tx.rollback().await.map_err(|e| e.to_string())?;
                    return Err("버전 충돌".to_string());
                }
            }
        }

        tx.commit().await.map_err(|e| e.to_string())?;

        // 커밋된 이벤트를 카프카에 발행
        for event in &stored {
            self.kafka_producer.send_event(event).await?;
        }

        Ok(())
    }
}

/// 이벤트 저장소 생성
impl PostgresEventStore {
    pub fn new(pool: Arc<PgPool>, kafka_producer: Arc<KafkaProducer>) -> Self {
        Self {
            pool,
            kafka_producer,
        }
    }
}

// endregion: --- Event Store

// region:    --- Event Consumer
/// 이벤트 프로젝션 구현체
/// 확정된 이벤트를 products/bids/auto_bids 읽기 모델에 반영한다
pub struct EventConsumer {
    pool: Arc<PgPool>,
    kafka_consumer: Arc<KafkaConsumer>,
}

/// 이벤트 프로젝션 구현체 메서드 구현
impl EventConsumer {
    /// 이벤트 프로젝션 생성
    pub fn new(pool: Arc<PgPool>, kafka_consumer: Arc<KafkaConsumer>) -> Self {
        EventConsumer {
            pool,
            kafka_consumer,
        }
    }

    /// 이벤트 프로젝션 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        if let Err(e) = self
            .kafka_consumer
            .consume_events(EVENTS_TOPIC, move |event| {
                let pool = Arc::clone(&pool);
                Box::pin(async move {
                    if let Err(e) = Self::process_event(&pool, event).await {
                        error!("{:<12} --> 이벤트 처리 오류: {:?}", "EventConsume", e);
                    }
                    Ok(())
                })
            })
            .await
        {
            error!("{:<12} --> 이벤트 소비 오류: {:?}", "EventConsume", e);
        }
    }

    /// 이벤트 처리
    async fn process_event(pool: &PgPool, event: Event) -> Result<(), Box<dyn std::error::Error>> {
        match event.event_type.as_str() {
            "BidPlaced" => Self::handle_bid_placed(pool, &event).await?,
            "AutoBidRegistered" => Self::handle_auto_bid_registered(pool, &event).await?,
            "BuyNowExecuted" => Self::handle_buy_now_executed(pool, &event).await?,
            _ => warn!(
                "{:<12} --> 알 수 없는 이벤트 타입: {}",
                "EventConsume", event.event_type
            ),
        }
        Ok(())
    }

    /// 입찰 이벤트 처리
    /// 현재 가격보다 높은 입찰만 반영되므로 재생/경합에도 가격은 단조 증가한다
    async fn handle_bid_placed(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
        info!("{:<12} --> 입찰(BidPlaced)", "EventConsume");
        let AuctionEvent::BidPlaced {
            product_id,
            bidder_id,
            bid_amount,
            auto_bid,
            timestamp,
        } = serde_json::from_value(event.data.clone())
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
        else {
            return Ok(());
        };

        let mut tx = pool.begin().await?;

        // 현재 가격 확인 및 최고 입찰자 갱신
        let result = sqlx::query(
            "UPDATE products SET current_price = $1, current_bidder_id = $2
             WHERE id = $3 AND current_price < $1
             RETURNING current_price",
        )
        .bind(bid_amount)
        .bind(bidder_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = result {
            // 입찰 기록 추가(이후 수정/삭제 없음)
            sqlx::query(
                "INSERT INTO bids (product_id, bidder_id, bid_amount, auto_bid, bid_time)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(product_id)
            .bind(bidder_id)
            .bind(bid_amount)
            .bind(auto_bid)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            info!(
                "{:<12} --> 입찰 성공: 현재 가격 {}",
                "EventConsume",
                row.get::<i64, _>("current_price")
            );
        } else {
            tx.rollback().await?;
            info!(
                "{:<12} --> 입찰 실패: 현재 가격이 더 높거나 같음",
                "EventConsume"
            );
        }
        Ok(())
    }

    /// 자동 입찰 상한 등록 이벤트 처리
    async fn handle_auto_bid_registered(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
        info!("{:<12} --> 상한 등록(AutoBidRegistered)", "EventConsume");
        let AuctionEvent::AutoBidRegistered {
            product_id,
            bidder_id,
            max_amount,
            timestamp,
        } = serde_json::from_value(event.data.clone())
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
        else {
            return Ok(());
        };

        // 상품별 입찰자당 상한 한 건(upsert)
        sqlx::query(
            "INSERT INTO auto_bids (product_id, bidder_id, max_amount, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (product_id, bidder_id)
             DO UPDATE SET max_amount = EXCLUDED.max_amount, updated_at = EXCLUDED.updated_at",
        )
        .bind(product_id)
        .bind(bidder_id)
        .bind(max_amount)
        .bind(timestamp)
        .execute(pool)
        .await?;

        info!(
            "{:<12} --> 상한 등록 성공: bidder {} max {}",
            "EventConsume", bidder_id, max_amount
        );
        Ok(())
    }

    /// 즉시 구매 이벤트 처리
    async fn handle_buy_now_executed(pool: &PgPool, event: &Event) -> Result<(), sqlx::Error> {
        info!("{:<12} --> 즉시 구매(BuyNowExecuted)", "EventConsume");
        let AuctionEvent::BuyNowExecuted {
            product_id,
            buyer_id,
            price,
            timestamp,
        } = serde_json::from_value(event.data.clone())
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
        else {
            return Ok(());
        };

        let mut tx = pool.begin().await?;

        // 현재 가격 확인, 낙찰자 기록, 경매 완료 처리
        let result = sqlx::query(
            "UPDATE products SET current_price = $1, current_bidder_id = $2, status = 'COMPLETED'
             WHERE id = $3 AND current_price < $1 AND status != 'COMPLETED'
             RETURNING current_price",
        )
        .bind(price)
        .bind(buyer_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = result {
            // 낙찰 입찰 기록 추가
            sqlx::query(
                "INSERT INTO bids (product_id, bidder_id, bid_amount, auto_bid, bid_time)
                 VALUES ($1, $2, $3, FALSE, $4)",
            )
            .bind(product_id)
            .bind(buyer_id)
            .bind(price)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            info!(
                "{:<12} --> 즉시 구매 성공: 최종 가격 {}",
                "EventConsume",
                row.get::<i64, _>("current_price")
            );
        } else {
            tx.rollback().await?;
            info!(
                "{:<12} --> 즉시 구매 실패: 현재 가격이 더 높거나 같음, 또는 이미 완료된 경매",
                "EventConsume"
            );
        }
        Ok(())
    }
}
// endregion: --- Event Consumer
