/// 입찰 관련 커맨드 처리
/// 1. 입찰(자동 입찰 연쇄 포함)
/// 2. 자동 입찰 상한 등록/갱신
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::auto_bid::{run_cascade, CascadeBid};
use crate::bidding::model::AutoBid;
use crate::database::DatabaseManager;
use crate::event_store::{Event, EventStore};
use crate::query::handlers;
use crate::query::handlers::get_product_version;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub product_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
    pub max_auto_bid: Option<i64>,
}

/// 자동 입찰 상한 등록 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterAutoBidCommand {
    pub product_id: i64,
    pub bidder_id: i64,
    pub max_amount: i64,
}

// 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

/// 1. 입찰
/// 검증을 통과한 수동 입찰과, 그로 인해 발생한 자동 입찰 연쇄를
/// 연속 버전의 이벤트 배치로 저장한다. 성공 시 확정된 입찰 시퀀스를 반환한다.
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    event_store: &impl EventStore,
    db_manager: &DatabaseManager,
) -> Result<Vec<CascadeBid>, serde_json::Value> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);
    let mut retries = 0;

    while retries < MAX_RETRIES {
        // 현재 버전 조회
        let current_version = get_product_version(db_manager, cmd.product_id)
            .await
            .map_err(|e| serde_json::json!({"error": e.to_string()}))?;

        // 상품 정보 조회
        let product = handlers::get_product(db_manager, cmd.product_id)
            .await
            .map_err(|e| serde_json::json!({"error": e.to_string()}))?;

        let now = Utc::now();

        // 경매 상태 및 시간 검증
        if now < product.start_time {
            return Err(serde_json::json!({
                "error": "경매가 아직 시작되지 않았습니다.",
                "code": "NOT_STARTED"
            }));
        }

        match product.status.as_str() {
            "SCHEDULED" => {
                return Err(
                    serde_json::json!({"error": "경매가 아직 시작되지 않았습니다.", "code": "NOT_STARTED"}),
                )
            }
            "COMPLETED" => {
                return Err(
                    serde_json::json!({"error": "경매가 이미 종료되었습니다.", "code": "ALREADY_ENDED"}),
                )
            }
            _ if now > product.end_time => {
                return Err(
                    serde_json::json!({"error": "경매가 이미 종료되었습니다.", "code": "ALREADY_ENDED"}),
                )
            }
            "ACTIVE" if now <= product.end_time => {
                if cmd.bid_amount <= product.current_price {
                    return Err(serde_json::json!({
                        "error": "입찰 금액이 현재 가격보다 낮습니다.",
                        "code": "LOW_BID",
                        "bid_amount": cmd.bid_amount,
                    }));
                }

                // 함께 등록하는 상한은 입찰 금액 이상이어야 한다
                if let Some(max_auto_bid) = cmd.max_auto_bid {
                    if max_auto_bid < cmd.bid_amount {
                        return Err(serde_json::json!({
                            "error": "자동 입찰 상한이 입찰 금액보다 낮습니다.",
                            "code": "CEILING_TOO_LOW",
                            "max_auto_bid": max_auto_bid,
                        }));
                    }
                }

                // 입찰 금액이 즉시구매 가격 이상인 경우 낙찰 처리
                if cmd.bid_amount >= product.buy_now_price {
                    let buy_now_event = AuctionEvent::BuyNowExecuted {
                        product_id: cmd.product_id,
                        buyer_id: cmd.bidder_id,
                        price: product.buy_now_price, // 입찰가 대신 즉시구매 가격으로 처리
                        timestamp: now,
                    };

                    let event = Event {
                        id: 0,
                        aggregate_id: cmd.product_id,
                        event_type: "BuyNowExecuted".to_string(),
                        data: serde_json::to_value(buy_now_event)
                            .map_err(|e| serde_json::json!({"error": e.to_string()}))?,
                        timestamp: now,
                        version: current_version + 1,
                    };

                    // 이벤트 저장 및 발행
                    match event_store.append_and_publish_event(event).await {
                        Ok(_) => {
                            info!(
                                "{:<12} --> BuyNowExecuted 이벤트가 성공적으로 저장되었습니다.",
                                "Command"
                            );
                            return Ok(vec![CascadeBid {
                                bidder_id: cmd.bidder_id,
                                bid_amount: product.buy_now_price,
                                auto_bid: false,
                            }]);
                        }
                        Err(e) if e.contains("버전 충돌") => {
                            retries += 1;
                            continue;
                        }
                        Err(e) => return Err(serde_json::json!({"error": e})),
                    }
                }

                // 등록된 자동 입찰 상한 조회(요청에 실린 상한 반영)
                let mut ceilings =
                    handlers::get_product_auto_bids(db_manager, cmd.product_id)
                        .await
                        .map_err(|e| serde_json::json!({"error": e.to_string()}))?;
                if let Some(max_auto_bid) = cmd.max_auto_bid {
                    match ceilings.iter_mut().find(|c| c.bidder_id == cmd.bidder_id) {
                        Some(own) => {
                            own.max_amount = max_auto_bid;
                            own.updated_at = now;
                        }
                        None => ceilings.push(AutoBid {
                            product_id: cmd.product_id,
                            bidder_id: cmd.bidder_id,
                            max_amount: max_auto_bid,
                            updated_at: now,
                        }),
                    }
                }

                // 수동 입찰 + 자동 입찰 연쇄 계산
                let cascade = run_cascade(
                    cmd.bidder_id,
                    cmd.bid_amount,
                    product.bid_increment,
                    product.buy_now_price,
                    &ceilings,
                );

                // 이벤트 배치 구성(상한 등록 + 입찰 시퀀스, 연속 버전)
                let mut version = current_version;
                let mut events = Vec::with_capacity(cascade.len() + 1);
                if let Some(max_auto_bid) = cmd.max_auto_bid {
                    let ceiling_event = AuctionEvent::AutoBidRegistered {
                        product_id: cmd.product_id,
                        bidder_id: cmd.bidder_id,
                        max_amount: max_auto_bid,
                        timestamp: now,
                    };
                    version += 1;
                    events.push(Event {
                        id: 0,
                        aggregate_id: cmd.product_id,
                        event_type: "AutoBidRegistered".to_string(),
                        data: serde_json::to_value(ceiling_event)
                            .map_err(|e| serde_json::json!({"error": e.to_string()}))?,
                        timestamp: now,
                        version,
                    });
                }
                for bid in &cascade {
                    let bid_event = AuctionEvent::BidPlaced {
                        product_id: cmd.product_id,
                        bidder_id: bid.bidder_id,
                        bid_amount: bid.bid_amount,
                        auto_bid: bid.auto_bid,
                        timestamp: now,
                    };
                    version += 1;
                    events.push(Event {
                        id: 0,
                        aggregate_id: cmd.product_id,
                        event_type: "BidPlaced".to_string(),
                        data: serde_json::to_value(bid_event)
                            .map_err(|e| serde_json::json!({"error": e.to_string()}))?,
                        timestamp: now,
                        version,
                    });
                }

                // 이벤트 배치 저장 및 발행
                match event_store.append_and_publish_events(events).await {
                    Ok(_) => return Ok(cascade),
                    Err(e) if e.contains("버전 충돌") => {
                        warn!(
                            "{:<12} --> 낙관적 업데이트로 인한 버전 충돌: 재시도",
                            "Command"
                        );
                        retries += 1;
                        continue;
                    }
                    Err(e) => return Err(serde_json::json!({"error": e})),
                }
            }
            _ => {
                return Err(
                    serde_json::json!({"error": "잘못된 경매 상태입니다.", "code": "INVALID_STATUS"}),
                )
            }
        }
    }

    Err(serde_json::json!({"error": "최대 재시도 횟수 초과", "code": "MAX_RETRIES_EXCEEDED"}))
}

/// 2. 자동 입찰 상한 등록/갱신
/// 상한만 저장하며 즉시 입찰하지 않는다. 상한은 보유자가 다음에
/// 추월당할 때부터 연쇄에 참여한다.
pub async fn handle_register_auto_bid(
    cmd: RegisterAutoBidCommand,
    event_store: &impl EventStore,
    db_manager: &DatabaseManager,
) -> Result<(), serde_json::Value> {
    info!(
        "{:<12} --> 자동 입찰 상한 등록 처리 시작: {:?}",
        "Command", cmd
    );
    let mut retries = 0;

    while retries < MAX_RETRIES {
        // 현재 버전 조회
        let current_version = get_product_version(db_manager, cmd.product_id)
            .await
            .map_err(|e| serde_json::json!({"error": e.to_string()}))?;

        // 상품 정보 조회
        let product = handlers::get_product(db_manager, cmd.product_id)
            .await
            .map_err(|e| serde_json::json!({"error": e.to_string()}))?;

        let now = Utc::now();

        // 경매 상태 및 시간 검증
        if now < product.start_time {
            return Err(serde_json::json!({
                "error": "경매가 아직 시작되지 않았습니다.",
                "code": "NOT_STARTED"
            }));
        }

        match product.status.as_str() {
            "SCHEDULED" => {
                return Err(
                    serde_json::json!({"error": "경매가 아직 시작되지 않았습니다.", "code": "NOT_STARTED"}),
                )
            }
            "COMPLETED" => {
                return Err(
                    serde_json::json!({"error": "경매가 이미 종료되었습니다.", "code": "ALREADY_ENDED"}),
                )
            }
            _ if now > product.end_time => {
                return Err(
                    serde_json::json!({"error": "경매가 이미 종료되었습니다.", "code": "ALREADY_ENDED"}),
                )
            }
            "ACTIVE" if now <= product.end_time => {
                // 상한은 현재 가격을 초과해야 의미가 있다
                if cmd.max_amount <= product.current_price {
                    return Err(serde_json::json!({
                        "error": "자동 입찰 상한이 현재 가격보다 낮습니다.",
                        "code": "CEILING_TOO_LOW",
                        "max_amount": cmd.max_amount,
                    }));
                }

                let ceiling_event = AuctionEvent::AutoBidRegistered {
                    product_id: cmd.product_id,
                    bidder_id: cmd.bidder_id,
                    max_amount: cmd.max_amount,
                    timestamp: now,
                };

                let event = Event {
                    id: 0,
                    aggregate_id: cmd.product_id,
                    event_type: "AutoBidRegistered".to_string(),
                    data: serde_json::to_value(ceiling_event)
                        .map_err(|e| serde_json::json!({"error": e.to_string()}))?,
                    timestamp: now,
                    version: current_version + 1,
                };

                // 이벤트 저장 및 발행
                match event_store.append_and_publish_event(event).await {
                    Ok(_) => return Ok(()),
                    Err(e) if e.contains("버전 충돌") => {
                        retries += 1;
                        continue;
                    }
                    Err(e) => return Err(serde_json::json!({"error": e})),
                }
            }
            _ => {
                return Err(
                    serde_json::json!({"error": "잘못된 경매 상태입니다.", "code": "INVALID_STATUS"}),
                )
            }
        }
    }

    Err(serde_json::json!({"error": "최대 재시도 횟수 초과", "code": "MAX_RETRIES_EXCEEDED"}))
}

// endregion: --- Commands
