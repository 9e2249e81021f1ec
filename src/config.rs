// =============================================================================
// Engine Configuration - hot-loadable settings with atomic save
// =============================================================================
//
// Every tunable parameter of the simulator and trading engine lives here.
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTC".to_string(),
        "ETH".to_string(),
        "USDT".to_string(),
        "BNB".to_string(),
        "ADA".to_string(),
    ]
}

fn default_quote_symbol() -> String {
    "USDT".to_string()
}

fn default_pegged_symbol() -> String {
    "USDT".to_string()
}

fn default_volatility_factor() -> f64 {
    0.02
}

fn default_price_tick_secs() -> u64 {
    2
}

fn default_baseline_refresh_secs() -> u64 {
    5
}

fn default_mark_interval_secs() -> u64 {
    1
}

fn default_persist_interval_secs() -> u64 {
    30
}

fn default_candle_interval_minutes() -> u32 {
    1
}

fn default_balance() -> f64 {
    10_000.0
}

fn default_forfeit_on_reset() -> bool {
    true
}

fn default_state_dir() -> String {
    "vega_state".to_string()
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level configuration for the Vega engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Assets -------------------------------------------------------------
    /// Asset symbols the simulator generates prices for.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Quote currency used to form trading pairs (e.g. "BTC/USDT").
    #[serde(default = "default_quote_symbol")]
    pub quote_symbol: String,

    /// Stable symbol held at exactly 1.0 by the simulator.
    #[serde(default = "default_pegged_symbol")]
    pub pegged_symbol: String,

    // --- Simulation ---------------------------------------------------------
    /// Per-tick noise amplitude as a fraction of price. Sensible range is
    /// roughly 0.01 to 0.04.
    #[serde(default = "default_volatility_factor")]
    pub volatility_factor: f64,

    /// Seconds between price simulator ticks.
    #[serde(default = "default_price_tick_secs")]
    pub price_tick_secs: u64,

    /// Seconds between baseline refreshes from the external price source.
    #[serde(default = "default_baseline_refresh_secs")]
    pub baseline_refresh_secs: u64,

    /// Seconds between mark-to-market sweeps over open trades.
    #[serde(default = "default_mark_interval_secs")]
    pub mark_interval_secs: u64,

    /// Seconds between ledger checkpoints to the state store.
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,

    /// Candle bucket width for chart aggregation.
    #[serde(default = "default_candle_interval_minutes")]
    pub candle_interval_minutes: u32,

    // --- Ledger policy ------------------------------------------------------
    /// Balance assigned on first run and on reset.
    #[serde(default = "default_balance")]
    pub default_balance: f64,

    /// Reject ledger deltas that would drive the balance negative. Off by
    /// default: trade amounts are validated upstream by the engine.
    #[serde(default)]
    pub forbid_negative_balance: bool,

    /// When true, a balance reset clears open trades and forfeits their
    /// escrow. When false, open trades survive the reset.
    #[serde(default = "default_forfeit_on_reset")]
    pub forfeit_on_reset: bool,

    // --- Persistence --------------------------------------------------------
    /// Directory for the file-backed state store.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            quote_symbol: default_quote_symbol(),
            pegged_symbol: default_pegged_symbol(),
            volatility_factor: default_volatility_factor(),
            price_tick_secs: default_price_tick_secs(),
            baseline_refresh_secs: default_baseline_refresh_secs(),
            mark_interval_secs: default_mark_interval_secs(),
            persist_interval_secs: default_persist_interval_secs(),
            candle_interval_minutes: default_candle_interval_minutes(),
            default_balance: default_balance(),
            forbid_negative_balance: false,
            forfeit_on_reset: default_forfeit_on_reset(),
            state_dir: default_state_dir(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            volatility = config.volatility_factor,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise engine config")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Trading pair for a base asset, e.g. "BTC" -> "BTC/USDT".
    pub fn pair_for(&self, base: &str) -> String {
        format!("{base}/{}", self.quote_symbol)
    }
}
