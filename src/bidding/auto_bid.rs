/// 자동 입찰(대리 입찰) 연쇄 처리
/// 수동 입찰이 접수된 후, 등록된 상한들을 대결시켜 추가 입찰 시퀀스를 계산한다.
// region:    --- Imports
use crate::bidding::model::AutoBid;

// endregion: --- Imports

// region:    --- Cascade

/// 연쇄 처리로 확정된 입찰 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeBid {
    pub bidder_id: i64,
    pub bid_amount: i64,
    pub auto_bid: bool,
}

/// 수동 입찰 이후의 자동 입찰 연쇄를 계산
///
/// 규칙:
/// - 현재 선두가 아닌 입찰자 중 가장 높은 상한(동률이면 먼저 등록한 쪽)이 도전한다.
/// - 도전자의 상한이 선두의 방어 상한을 초과하면 선두가 교체되고,
///   호가는 min(도전자 상한, 방어 상한 + 입찰 단위)까지 오른다.
/// - 초과하지 못하면 도전자는 자신의 상한까지 호가하고 선두 대리인이 재역전한다.
/// - 상한이 같으면 먼저 등록한 대리인이 선두를 유지한다.
/// - 자동 입찰은 즉시 구매 가격에 도달하지 않는다(도달 직전에 연쇄 중단).
///
/// 모든 자동 입찰 금액은 해당 입찰자의 상한 이하이며, 반환 시퀀스의 금액은
/// 순증가한다. 매 반복마다 패자가 한 명씩 탈락하므로 연쇄는 반드시 끝난다.
pub fn run_cascade(
    bidder_id: i64,
    bid_amount: i64,
    bid_increment: i64,
    buy_now_price: i64,
    ceilings: &[AutoBid],
) -> Vec<CascadeBid> {
    let mut bids = vec![CascadeBid {
        bidder_id,
        bid_amount,
        auto_bid: false,
    }];

    let mut leader = bidder_id;
    let mut leader_ceiling = ceilings
        .iter()
        .find(|c| c.bidder_id == bidder_id)
        .map(|c| c.max_amount);
    let mut price = bid_amount;

    loop {
        // 선두가 아닌 입찰자 중 현재가를 넘는 최고 상한 선택(동률은 먼저 등록한 쪽)
        let challenger = ceilings.iter().filter(|c| c.bidder_id != leader && c.max_amount > price).max_by(
            |a, b| {
                a.max_amount
                    .cmp(&b.max_amount)
                    .then_with(|| b.updated_at.cmp(&a.updated_at))
            },
        );
        let Some(challenger) = challenger else {
            break;
        };

        // 선두 대리인이 방어할 수 있는 상한
        let defense = leader_ceiling.map_or(price, |c| c.max(price));

        if challenger.max_amount > defense {
            // 선두 교체: 기존 선두 대리인은 자신의 상한까지 방어 호가
            if defense > price {
                if defense >= buy_now_price {
                    break;
                }
                bids.push(CascadeBid {
                    bidder_id: leader,
                    bid_amount: defense,
                    auto_bid: true,
                });
                price = defense;
            }
            let counter = challenger.max_amount.min(price + bid_increment);
            if counter >= buy_now_price {
                break;
            }
            bids.push(CascadeBid {
                bidder_id: challenger.bidder_id,
                bid_amount: counter,
                auto_bid: true,
            });
            leader = challenger.bidder_id;
            leader_ceiling = Some(challenger.max_amount);
            price = counter;
        } else if challenger.max_amount < defense {
            // 방어 성공: 도전자는 상한까지 호가하고 선두 대리인이 재역전
            if challenger.max_amount >= buy_now_price {
                break;
            }
            bids.push(CascadeBid {
                bidder_id: challenger.bidder_id,
                bid_amount: challenger.max_amount,
                auto_bid: true,
            });
            let counter = defense.min(challenger.max_amount + bid_increment);
            if counter >= buy_now_price {
                break;
            }
            bids.push(CascadeBid {
                bidder_id: leader,
                bid_amount: counter,
                auto_bid: true,
            });
            price = counter;
        } else {
            // 상한 동률: 먼저 선 대리인을 넘지 못하므로 도전자는 입찰 없이 탈락,
            // 선두 대리인이 동률 가격까지 호가를 올린다
            if defense >= buy_now_price {
                break;
            }
            bids.push(CascadeBid {
                bidder_id: leader,
                bid_amount: defense,
                auto_bid: true,
            });
            price = defense;
        }
    }

    bids
}

// endregion: --- Cascade

// endregion: --- Tests
