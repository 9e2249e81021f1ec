// =============================================================================
// Demo seed - fabricated trade history for showcase accounts
// =============================================================================
//
// Purely a data-seeding concern: fills a ledger's closed history with a
// plausible back-dated track record. The engine never calls this; only a
// host that explicitly wants a pre-populated demo account does.
// =============================================================================

use rand::Rng;
use uuid::Uuid;

use crate::clock::Clock;
use crate::ledger::{PositionLedger, Trade};
use crate::types::{CloseReason, TradeSide, TradeStatus};

const SEED_PAIRS: &[&str] = &["BTC/USDT", "ETH/USDT", "BNB/USDT", "ADA/USDT"];
const SEED_DURATIONS: &[u64] = &[60, 300, 900];

/// Rough entry-price magnitude per base asset, so the fabricated fills look
/// plausible on a history page.
fn seed_price_for(pair: &str) -> f64 {
    match pair.split('/').next().unwrap_or_default() {
        "BTC" => 64_000.0,
        "ETH" => 3_100.0,
        "BNB" => 550.0,
        _ => 0.5,
    }
}

/// Fill the ledger's closed history with `count` fabricated trades spread
/// over the past weeks (one every three days, oldest first). The balance is
/// left untouched.
pub fn seed_demo_history<R: Rng>(
    ledger: &PositionLedger,
    clock: &dyn Clock,
    rng: &mut R,
    count: usize,
) {
    const DAY_MS: i64 = 86_400_000;
    let now_ms = clock.now_ms();

    for i in (1..=count).rev() {
        let pair = SEED_PAIRS[rng.random_range(0..SEED_PAIRS.len())];
        let side = if rng.random_bool(0.5) {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let amount = rng.random_range(50.0..1_000.0_f64).round();
        let duration_secs = SEED_DURATIONS[rng.random_range(0..SEED_DURATIONS.len())];

        let base_price = seed_price_for(pair);
        let entry = base_price * rng.random_range(0.95..1.05);
        // Mild wins slightly more often than mild losses.
        let profit = amount * rng.random_range(-0.08..0.12);
        let move_ratio = profit / amount;
        let exit = match side {
            TradeSide::Buy => entry * (1.0 + move_ratio),
            TradeSide::Sell => entry * (1.0 - move_ratio),
        };

        let opened_at_ms = now_ms - i as i64 * 3 * DAY_MS;
        let closed_at_ms = opened_at_ms + duration_secs as i64 * 1_000;

        ledger.move_to_closed(Trade {
            id: Uuid::new_v4().to_string(),
            pair: pair.to_string(),
            side,
            amount,
            price_at_execution: entry,
            opened_at_ms,
            duration_secs,
            current_price: exit,
            profit,
            status: TradeStatus::Closed,
            closed_at_ms: Some(closed_at_ms),
            close_reason: Some(if rng.random_bool(0.5) {
                CloseReason::Manual
            } else {
                CloseReason::Expired
            }),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn seeds_closed_history_without_touching_balance() {
        let ledger = PositionLedger::new(1_000.0, false);
        let clock = ManualClock::new(1_700_000_000_000);
        let mut rng = StdRng::seed_from_u64(3);

        seed_demo_history(&ledger, &clock, &mut rng, 15);

        assert_eq!(ledger.balance(), 1_000.0);
        assert_eq!(ledger.open_count(), 0);

        let stats = ledger.journal_stats();
        assert_eq!(stats.total_trades, 15);

        let trades = ledger.closed_trades(15);
        assert!(trades
            .iter()
            .all(|t| t.status == TradeStatus::Closed && t.close_reason.is_some()));
        // Newest first: the most recent fabricated trade is three days back.
        assert!(trades[0].opened_at_ms > trades[14].opened_at_ms);
        // Loss never exceeds the stake.
        assert!(trades.iter().all(|t| t.profit >= -t.amount));
    }
}
