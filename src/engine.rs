// =============================================================================
// Trading Engine - virtual trade lifecycle against the simulated feed
// =============================================================================
//
// Life-cycle per trade:
//   Open -> Closed (manual close / duration expiry / reset forfeiture)
//
// Opening escrows the stake: the amount leaves the balance immediately and
// returns (plus or minus profit) on close. The realized loss is clamped at
// the escrowed amount, so one trade can never cost more than its stake.
//
// The mark-to-market tick values every open trade against a single price
// snapshot; a missing price retains the last known mark and never fails
// the sweep.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{JournalStats, LedgerState, PositionLedger, Trade};
use crate::market::{AssetQuote, PriceSimulator};
use crate::notify::{NoticeKind, Notifier};
use crate::persistence::KvStore;
use crate::types::{CloseReason, TradeSide, TradeStatus};

/// Key under which the ledger is persisted in the state store.
const LEDGER_KEY: &str = "ledger";

/// Closed trades included in a presentation snapshot.
const SNAPSHOT_CLOSED_COUNT: usize = 50;

/// Unrealized profit of a position at `current` price.
fn unrealized_profit(side: TradeSide, amount: f64, entry: f64, current: f64) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    match side {
        TradeSide::Buy => amount * (current - entry) / entry,
        TradeSide::Sell => amount * (entry - current) / entry,
    }
}

/// Full serialisable engine state for a presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub server_time_ms: i64,
    pub balance: f64,
    pub quotes: Vec<AssetQuote>,
    pub open_trades: Vec<Trade>,
    pub recent_closed: Vec<Trade>,
    pub journal: JournalStats,
}

/// Orchestrates trade open/close against the live simulated prices and
/// drives all ledger mutations.
pub struct TradingEngine {
    simulator: Arc<PriceSimulator>,
    ledger: Arc<PositionLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    default_balance: f64,
    forfeit_on_reset: bool,
}

impl TradingEngine {
    pub fn new(
        simulator: Arc<PriceSimulator>,
        ledger: Arc<PositionLedger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        default_balance: f64,
        forfeit_on_reset: bool,
    ) -> Self {
        Self {
            simulator,
            ledger,
            notifier,
            clock,
            default_balance,
            forfeit_on_reset,
        }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Open a virtual trade. The stake is debited (escrowed) immediately.
    ///
    /// Fails without any state change on a bad amount or pair, insufficient
    /// balance, or an asset that has never been primed with a price.
    pub fn open(
        &self,
        pair: &str,
        side: TradeSide,
        amount: f64,
        duration_secs: u64,
    ) -> EngineResult<Trade> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::Validation(format!(
                "trade amount must be positive, got {amount}"
            )));
        }
        let (base, quote) = pair
            .split_once('/')
            .ok_or_else(|| EngineError::Validation(format!("malformed pair: {pair}")))?;
        if base.is_empty() || quote.is_empty() {
            return Err(EngineError::Validation(format!("malformed pair: {pair}")));
        }

        let available = self.ledger.balance();
        if amount > available {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        let price = self
            .simulator
            .current_price(base)
            .ok_or_else(|| EngineError::PriceUnavailable(base.to_string()))?;

        // Escrow the stake for the trade's lifetime.
        self.ledger.apply_delta(-amount)?;

        let trade = Trade {
            id: Uuid::new_v4().to_string(),
            pair: pair.to_string(),
            side,
            amount,
            price_at_execution: price,
            opened_at_ms: self.clock.now_ms(),
            duration_secs,
            current_price: price,
            profit: 0.0,
            status: TradeStatus::Open,
            closed_at_ms: None,
            close_reason: None,
        };

        info!(
            id = %trade.id,
            pair,
            side = %side,
            amount,
            price,
            duration_secs,
            "trade opened"
        );
        self.notifier.notify(
            NoticeKind::TradeOpened,
            &format!("{side} {pair} for {amount:.2} at {price:.2}"),
        );

        self.ledger.insert(trade.clone());
        Ok(trade)
    }

    // -------------------------------------------------------------------------
    // Mark-to-market
    // -------------------------------------------------------------------------

    /// Re-value every open trade and auto-close the ones whose duration has
    /// elapsed.
    ///
    /// All trades in one sweep are marked against the same price snapshot.
    /// A pair whose price is unavailable keeps its last known mark; one
    /// trade's failure never stops the sweep.
    pub fn tick(&self) {
        let open = self.ledger.open_trades();
        if open.is_empty() {
            return;
        }

        let now_ms = self.clock.now_ms();
        let prices = self.simulator.price_snapshot();
        let mut due: Vec<String> = Vec::new();

        for trade in &open {
            let current = prices
                .get(trade.base_asset())
                .copied()
                .unwrap_or(trade.current_price);
            let profit =
                unrealized_profit(trade.side, trade.amount, trade.price_at_execution, current);
            self.ledger.update_mark(&trade.id, current, profit);

            let age_ms = now_ms - trade.opened_at_ms;
            if age_ms >= trade.duration_secs as i64 * 1_000 {
                due.push(trade.id.clone());
            }
        }

        for id in due {
            if let Err(e) = self.close_with_reason(&id, CloseReason::Expired) {
                warn!(trade_id = %id, error = %e, "duration auto-close failed");
                self.notifier
                    .notify(NoticeKind::Error, &format!("auto-close failed for {id}: {e}"));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Close a trade by user action.
    ///
    /// A second close of the same id fails with `TradeNotFound`: the trade
    /// has already left the open set.
    pub fn close(&self, trade_id: &str) -> EngineResult<Trade> {
        self.close_with_reason(trade_id, CloseReason::Manual)
    }

    fn close_with_reason(&self, trade_id: &str, reason: CloseReason) -> EngineResult<Trade> {
        let mut trade = self
            .ledger
            .remove(trade_id)
            .ok_or_else(|| EngineError::TradeNotFound(trade_id.to_string()))?;

        let current = self
            .simulator
            .current_price(trade.base_asset())
            .unwrap_or(trade.current_price);

        let raw = unrealized_profit(trade.side, trade.amount, trade.price_at_execution, current);
        // Worst-case loss is bounded at the escrowed stake.
        let profit = raw.max(-trade.amount);

        self.ledger.apply_delta(trade.amount + profit)?;

        trade.current_price = current;
        trade.profit = profit;
        trade.status = TradeStatus::Closed;
        trade.closed_at_ms = Some(self.clock.now_ms());
        trade.close_reason = Some(reason);

        info!(
            id = %trade.id,
            pair = %trade.pair,
            reason = %reason,
            close_price = current,
            profit,
            "trade closed"
        );
        self.notifier.notify(
            NoticeKind::TradeClosed,
            &format!(
                "{} {} closed ({reason}): {:+.2}",
                trade.side, trade.pair, profit
            ),
        );

        self.ledger.move_to_closed(trade.clone());
        Ok(trade)
    }

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    /// Reinitialise the balance to the configured default.
    ///
    /// With `forfeit_on_reset` the open set is cleared and each trade's
    /// escrow is forfeited (recorded in the closed history with
    /// `profit = -amount`). Otherwise open trades survive the reset and
    /// settle against the new balance when they close.
    pub fn reset_balance(&self) {
        if self.forfeit_on_reset {
            let now_ms = self.clock.now_ms();
            for mut trade in self.ledger.drain_open() {
                trade.status = TradeStatus::Closed;
                trade.profit = -trade.amount;
                trade.closed_at_ms = Some(now_ms);
                trade.close_reason = Some(CloseReason::Forfeited);
                warn!(
                    id = %trade.id,
                    pair = %trade.pair,
                    amount = trade.amount,
                    "open trade forfeited by balance reset"
                );
                self.ledger.move_to_closed(trade);
            }
        }

        self.ledger.set_balance(self.default_balance);
        info!(balance = self.default_balance, "virtual balance reset");
        self.notifier.notify(
            NoticeKind::BalanceReset,
            &format!("balance reset to {:.2}", self.default_balance),
        );
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn balance(&self) -> f64 {
        self.ledger.balance()
    }

    pub fn open_trades(&self) -> Vec<Trade> {
        self.ledger.open_trades()
    }

    /// Build a complete, serialisable snapshot for a presentation layer.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            server_time_ms: self.clock.now_ms(),
            balance: self.ledger.balance(),
            quotes: self.simulator.quotes(),
            open_trades: self.ledger.open_trades(),
            recent_closed: self.ledger.closed_trades(SNAPSHOT_CLOSED_COUNT),
            journal: self.ledger.journal_stats(),
        }
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Checkpoint the ledger to the state store.
    pub fn persist(&self, store: &dyn KvStore) -> anyhow::Result<()> {
        let state = self.ledger.state();
        let bytes = serde_json::to_vec_pretty(&state).context("failed to serialise ledger")?;
        store.save(LEDGER_KEY, &bytes)
    }

    /// Reload a previously persisted ledger. Returns `false` when the store
    /// holds no state yet (first run).
    pub fn restore(&self, store: &dyn KvStore) -> anyhow::Result<bool> {
        match store.load(LEDGER_KEY)? {
            Some(bytes) => {
                let state: LedgerState =
                    serde_json::from_slice(&bytes).context("failed to parse persisted ledger")?;
                info!(
                    balance = state.balance,
                    open = state.open.len(),
                    closed = state.closed.len(),
                    "ledger state restored"
                );
                self.ledger.restore(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for TradingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingEngine")
            .field("ledger", &self.ledger)
            .field("default_balance", &self.default_balance)
            .field("forfeit_on_reset", &self.forfeit_on_reset)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
