pub mod candles;
pub mod simulator;
pub mod source;

// Re-export the core market types for convenient access
// (e.g. `use crate::market::PriceSimulator`).
pub use candles::{group_candles, rolling_candles, Candle};
pub use simulator::{AssetQuote, PriceSimulator, HISTORY_CAPACITY};
pub use source::{CoinGeckoSource, PriceSource, StaticSource};
