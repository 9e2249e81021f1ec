// =============================================================================
// Error taxonomy for engine operations
// =============================================================================
//
// Every variant is returned to the caller; none is fatal to the engine
// process. The periodic loops keep running after any single tick's partial
// failure.
// =============================================================================

use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by the trading engine, ledger, and price source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed request (bad amount or pair). No state change.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requested amount exceeds the available balance. No state change.
    #[error("insufficient balance: requested {requested:.2}, available {available:.2}")]
    InsufficientBalance { requested: f64, available: f64 },

    /// A ledger delta would drive the balance negative while the ledger is
    /// configured to forbid it.
    #[error("balance cannot go negative")]
    InsufficientFunds,

    /// The asset has never been primed with a price.
    #[error("no price available for {0}")]
    PriceUnavailable(String),

    /// The external baseline price source failed. Stale prices are kept.
    #[error("price source unavailable: {0}")]
    SourceUnavailable(String),

    /// Unknown or already-closed trade id.
    #[error("trade not found: {0}")]
    TradeNotFound(String),
}
