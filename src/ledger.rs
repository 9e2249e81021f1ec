// =============================================================================
// Position Ledger - balance plus open / closed virtual trades
// =============================================================================
//
// The exclusive-access store behind the trading engine. One `RwLock` over
// the whole state serialises every mutation (open, close, reset); readers
// get cloned snapshots so display code never holds the lock.
//
// The ledger validates nothing about trade semantics; that is the engine's
// job. Its only policy is the optional non-negative balance floor.
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{CloseReason, TradeSide, TradeStatus};

// ---------------------------------------------------------------------------
// Trade model
// ---------------------------------------------------------------------------

/// A single virtual trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Trading pair, e.g. "BTC/USDT".
    pub pair: String,
    pub side: TradeSide,
    /// Escrowed stake in quote currency.
    pub amount: f64,
    pub price_at_execution: f64,
    /// Unix epoch milliseconds at open.
    pub opened_at_ms: i64,
    /// Trade lifetime; the engine auto-closes once this has elapsed.
    pub duration_secs: u64,
    #[serde(default)]
    pub current_price: f64,
    /// Unrealized profit while open, realized (and frozen) once closed.
    #[serde(default)]
    pub profit: f64,
    pub status: TradeStatus,
    #[serde(default)]
    pub closed_at_ms: Option<i64>,
    #[serde(default)]
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    /// Base asset of the pair ("BTC" for "BTC/USDT").
    pub fn base_asset(&self) -> &str {
        self.pair.split('/').next().unwrap_or(&self.pair)
    }
}

/// Aggregate statistics over the closed-trade history.
#[derive(Debug, Clone, Serialize)]
pub struct JournalStats {
    pub total_trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_net_profit: f64,
    pub profit_factor: f64,
}

/// Serialized form of the full ledger, persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub balance: f64,
    #[serde(default)]
    pub open: Vec<Trade>,
    #[serde(default)]
    pub closed: Vec<Trade>,
}

// ---------------------------------------------------------------------------
// Position Ledger
// ---------------------------------------------------------------------------

/// Thread-safe owner of the balance and the open/closed trade lists.
pub struct PositionLedger {
    inner: RwLock<LedgerState>,
    forbid_negative: bool,
}

impl PositionLedger {
    pub fn new(initial_balance: f64, forbid_negative: bool) -> Self {
        Self {
            inner: RwLock::new(LedgerState {
                balance: initial_balance,
                open: Vec::new(),
                closed: Vec::new(),
            }),
            forbid_negative,
        }
    }

    // -------------------------------------------------------------------------
    // Balance
    // -------------------------------------------------------------------------

    pub fn balance(&self) -> f64 {
        self.inner.read().balance
    }

    /// Add a (possibly negative) delta to the balance and return the new
    /// balance. Fails with `InsufficientFunds` only when the ledger is
    /// configured to forbid a negative result.
    pub fn apply_delta(&self, delta: f64) -> EngineResult<f64> {
        let mut state = self.inner.write();
        let next = state.balance + delta;
        if self.forbid_negative && next < 0.0 {
            return Err(EngineError::InsufficientFunds);
        }
        state.balance = next;
        Ok(next)
    }

    /// Overwrite the balance (reset support).
    pub fn set_balance(&self, balance: f64) {
        self.inner.write().balance = balance;
    }

    // -------------------------------------------------------------------------
    // Open-set mutation
    // -------------------------------------------------------------------------

    pub fn insert(&self, trade: Trade) {
        self.inner.write().open.push(trade);
    }

    /// Remove an open trade by id. Returns `None` when the id is unknown or
    /// the trade has already been closed.
    pub fn remove(&self, trade_id: &str) -> Option<Trade> {
        let mut state = self.inner.write();
        let idx = state.open.iter().position(|t| t.id == trade_id)?;
        Some(state.open.remove(idx))
    }

    /// Append a trade to the closed history.
    pub fn move_to_closed(&self, trade: Trade) {
        self.inner.write().closed.push(trade);
    }

    /// Take every open trade out of the ledger (reset support).
    pub fn drain_open(&self) -> Vec<Trade> {
        std::mem::take(&mut self.inner.write().open)
    }

    /// Update an open trade's mark-to-market fields in place.
    pub fn update_mark(&self, trade_id: &str, current_price: f64, profit: f64) {
        let mut state = self.inner.write();
        if let Some(trade) = state.open.iter_mut().find(|t| t.id == trade_id) {
            trade.current_price = current_price;
            trade.profit = profit;
        }
    }

    // -------------------------------------------------------------------------
    // Queries (cloned snapshots)
    // -------------------------------------------------------------------------

    /// Snapshot of all currently open trades.
    pub fn open_trades(&self) -> Vec<Trade> {
        self.inner.read().open.clone()
    }

    pub fn open_count(&self) -> usize {
        self.inner.read().open.len()
    }

    /// The most recent `count` closed trades (newest first).
    pub fn closed_trades(&self, count: usize) -> Vec<Trade> {
        let state = self.inner.read();
        state.closed.iter().rev().take(count).cloned().collect()
    }

    /// Win rate and net profit over the whole closed history.
    pub fn journal_stats(&self) -> JournalStats {
        let state = self.inner.read();
        let total_trades = state.closed.len();
        let wins = state.closed.iter().filter(|t| t.profit > 0.0).count();
        let total_net_profit: f64 = state.closed.iter().map(|t| t.profit).sum();
        let gross_profit: f64 = state
            .closed
            .iter()
            .map(|t| t.profit)
            .filter(|p| *p > 0.0)
            .sum();
        let gross_loss: f64 = state
            .closed
            .iter()
            .map(|t| t.profit)
            .filter(|p| *p < 0.0)
            .map(f64::abs)
            .sum();

        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        JournalStats {
            total_trades,
            wins,
            win_rate,
            total_net_profit,
            profit_factor,
        }
    }

    // -------------------------------------------------------------------------
    // Persistence support
    // -------------------------------------------------------------------------

    /// Full serialisable copy of the ledger.
    pub fn state(&self) -> LedgerState {
        self.inner.read().clone()
    }

    /// Replace the whole ledger with a previously persisted state.
    pub fn restore(&self, state: LedgerState) {
        *self.inner.write() = state;
    }
}

impl std::fmt::Debug for PositionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("PositionLedger")
            .field("balance", &state.balance)
            .field("open_trades", &state.open.len())
            .field("closed_trades", &state.closed.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(id: &str, profit: f64, status: TradeStatus) -> Trade {
        Trade {
            id: id.to_string(),
            pair: "BTC/USDT".to_string(),
            side: TradeSide::Buy,
            amount: 100.0,
            price_at_execution: 50_000.0,
            opened_at_ms: 0,
            duration_secs: 60,
            current_price: 50_000.0,
            profit,
            status,
            closed_at_ms: None,
            close_reason: None,
        }
    }

    #[test]
    fn apply_delta_moves_balance() {
        let ledger = PositionLedger::new(1_000.0, false);
        assert_eq!(ledger.apply_delta(-100.0).unwrap(), 900.0);
        assert_eq!(ledger.apply_delta(250.0).unwrap(), 1_150.0);
    }

    #[test]
    fn negative_balance_allowed_by_default_policy() {
        let ledger = PositionLedger::new(50.0, false);
        assert_eq!(ledger.apply_delta(-80.0).unwrap(), -30.0);
    }

    #[test]
    fn forbid_negative_rejects_overdraft() {
        let ledger = PositionLedger::new(50.0, true);
        assert_eq!(
            ledger.apply_delta(-80.0),
            Err(EngineError::InsufficientFunds)
        );
        // Balance unchanged after the rejection.
        assert_eq!(ledger.balance(), 50.0);
    }

    #[test]
    fn remove_is_single_shot() {
        let ledger = PositionLedger::new(0.0, false);
        ledger.insert(sample_trade("t1", 0.0, TradeStatus::Open));

        assert!(ledger.remove("t1").is_some());
        assert!(ledger.remove("t1").is_none());
        assert_eq!(ledger.open_count(), 0);
    }

    #[test]
    fn closed_trades_are_newest_first() {
        let ledger = PositionLedger::new(0.0, false);
        for i in 0..5 {
            ledger.move_to_closed(sample_trade(&format!("t{i}"), 0.0, TradeStatus::Closed));
        }
        let recent = ledger.closed_trades(3);
        let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2"]);
    }

    #[test]
    fn journal_stats_aggregate_closed_history() {
        let ledger = PositionLedger::new(0.0, false);
        ledger.move_to_closed(sample_trade("w1", 30.0, TradeStatus::Closed));
        ledger.move_to_closed(sample_trade("w2", 10.0, TradeStatus::Closed));
        ledger.move_to_closed(sample_trade("l1", -20.0, TradeStatus::Closed));

        let stats = ledger.journal_stats();
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.wins, 2);
        assert!((stats.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((stats.total_net_profit - 20.0).abs() < 1e-12);
        assert!((stats.profit_factor - 2.0).abs() < 1e-12);
    }

    #[test]
    fn drain_open_empties_the_open_set() {
        let ledger = PositionLedger::new(0.0, false);
        ledger.insert(sample_trade("a", 0.0, TradeStatus::Open));
        ledger.insert(sample_trade("b", 0.0, TradeStatus::Open));

        let drained = ledger.drain_open();
        assert_eq!(drained.len(), 2);
        assert_eq!(ledger.open_count(), 0);
    }

    #[test]
    fn update_mark_touches_only_the_target() {
        let ledger = PositionLedger::new(0.0, false);
        ledger.insert(sample_trade("a", 0.0, TradeStatus::Open));
        ledger.insert(sample_trade("b", 0.0, TradeStatus::Open));

        ledger.update_mark("a", 55_000.0, 10.0);

        let open = ledger.open_trades();
        let a = open.iter().find(|t| t.id == "a").unwrap();
        let b = open.iter().find(|t| t.id == "b").unwrap();
        assert_eq!(a.current_price, 55_000.0);
        assert_eq!(a.profit, 10.0);
        assert_eq!(b.profit, 0.0);
    }

    #[test]
    fn state_roundtrip_restores_everything() {
        let ledger = PositionLedger::new(750.0, false);
        ledger.insert(sample_trade("open1", 5.0, TradeStatus::Open));
        ledger.move_to_closed(sample_trade("done1", -3.0, TradeStatus::Closed));

        let state = ledger.state();
        let json = serde_json::to_string(&state).unwrap();
        let parsed: LedgerState = serde_json::from_str(&json).unwrap();

        let restored = PositionLedger::new(0.0, false);
        restored.restore(parsed);

        assert_eq!(restored.balance(), 750.0);
        assert_eq!(restored.open_count(), 1);
        assert_eq!(restored.closed_trades(10).len(), 1);
    }

    #[test]
    fn base_asset_extraction() {
        let trade = sample_trade("x", 0.0, TradeStatus::Open);
        assert_eq!(trade.base_asset(), "BTC");
    }
}
