/// 경매 상태 전이 스케줄러
/// 상품 카탈로그 CRUD는 별도 마이크로서비스 소관이라 가정
/// 본 서비스는 입찰 가능 여부를 가르는 상태 전이만 직접 수행한다.
/// (즉시 구매 낙찰은 이벤트 처리 경로에서 완료 상태로 전환된다)
// region:    --- Imports
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 경매 상태 전이 스케줄러
pub struct AuctionScheduler {
    pool: Arc<PgPool>,
}

/// 경매 상태 전이 스케줄러 구현
impl AuctionScheduler {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// 스케줄러 시작(1초 간격)
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                if let Err(e) = Self::advance_statuses(&pool).await {
                    error!(
                        "{:<12} --> 경매 상태 전이 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 시작/종료 시각이 지난 상품의 상태 전이
    async fn advance_statuses(pool: &PgPool) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        // SCHEDULED -> ACTIVE
        let activated = sqlx::query(
            "UPDATE products SET status = 'ACTIVE'
             WHERE status = 'SCHEDULED' AND start_time <= $1",
        )
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        // ACTIVE -> COMPLETED
        let completed = sqlx::query(
            "UPDATE products SET status = 'COMPLETED'
             WHERE status = 'ACTIVE' AND end_time <= $1",
        )
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        if activated > 0 || completed > 0 {
            debug!(
                "{:<12} --> 상태 전이: ACTIVE {}건, COMPLETED {}건",
                "Scheduler", activated, completed
            );
        }

        Ok(())
    }
}
// endregion: --- Auction Scheduler
