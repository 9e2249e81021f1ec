// =============================================================================
// Shared types used across the Vega paper-trading engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// A single raw price observation emitted by the simulator.
///
/// Immutable once emitted; candle aggregation and charting consume these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Direction of a virtual trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// Lifecycle state of a virtual trade. Open -> Closed, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl Default for TradeStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Why a trade left the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Closed by explicit user action.
    Manual,
    /// Auto-closed after its configured duration elapsed.
    Expired,
    /// Cleared by a balance reset; escrow not returned.
    Forfeited,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Expired => write!(f, "Expired"),
            Self::Forfeited => write!(f, "Forfeited"),
        }
    }
}
