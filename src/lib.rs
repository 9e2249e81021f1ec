// =============================================================================
// Vega Paper Nexus - simulated market feed and virtual trading engine
// =============================================================================
//
// A library core for paper-trading frontends: a noisy per-asset price
// simulator re-anchored to an external baseline source, pure OHLC candle
// aggregation for charting, and a trade lifecycle engine that escrows a
// virtual balance, marks open trades to market, and auto-closes them when
// their duration elapses.
//
// The crate exposes no network surface of its own; a presentation layer
// consumes the engine through `EngineSnapshot` and the trade operations,
// and supplies the collaborators (price source, state store, notifier).
// =============================================================================

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod market;
pub mod notify;
pub mod persistence;
pub mod runtime;
pub mod seed;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{EngineSnapshot, TradingEngine};
pub use error::{EngineError, EngineResult};
pub use ledger::{JournalStats, LedgerState, PositionLedger, Trade};
pub use market::{
    group_candles, rolling_candles, AssetQuote, Candle, CoinGeckoSource, PriceSimulator,
    PriceSource, StaticSource,
};
pub use notify::{LogNotifier, NoticeKind, Notifier, NullNotifier};
pub use persistence::{FileStore, KvStore, MemoryStore};
pub use runtime::EngineRuntime;
pub use types::{CloseReason, PricePoint, TradeSide, TradeStatus};
