// =============================================================================
// Baseline price source - external collaborator behind a trait
// =============================================================================
//
// The simulator's noise walk is periodically re-anchored to authoritative
// baseline prices. The source is abstract so the engine can run offline
// (StaticSource) or against the CoinGecko simple-price endpoint. Fetch
// failures surface as `SourceUnavailable` and the caller keeps stale prices.
// =============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// HTTP timeout for baseline fetches. A slow source must never stall a tick.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const COINGECKO_ENDPOINT: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Supplier of authoritative baseline prices for a set of symbols.
pub trait PriceSource: Send + Sync + 'static {
    /// Fetch current prices for the requested symbols. Symbols the source
    /// does not know may be absent from the result.
    fn fetch_baseline(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = EngineResult<HashMap<String, f64>>> + Send;
}

// ---------------------------------------------------------------------------
// CoinGecko implementation
// ---------------------------------------------------------------------------

/// Price source backed by the CoinGecko simple-price API.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    /// Symbol -> CoinGecko asset id.
    ids: HashMap<String, String>,
}

impl CoinGeckoSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();

        let ids = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("USDT", "tether"),
            ("BNB", "binancecoin"),
            ("ADA", "cardano"),
            ("SOL", "solana"),
            ("XRP", "ripple"),
        ]
        .into_iter()
        .map(|(sym, id)| (sym.to_string(), id.to_string()))
        .collect();

        Self { client, ids }
    }

    /// CoinGecko id for a symbol, if known.
    pub fn id_for(&self, symbol: &str) -> Option<&str> {
        self.ids.get(symbol).map(String::as_str)
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSource for CoinGeckoSource {
    async fn fetch_baseline(&self, symbols: &[String]) -> EngineResult<HashMap<String, f64>> {
        let ids: Vec<&str> = symbols
            .iter()
            .filter_map(|sym| self.id_for(sym))
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .client
            .get(COINGECKO_ENDPOINT)
            .query(&[("ids", ids.join(",")), ("vs_currencies", "usd".into())])
            .send()
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        let body: HashMap<String, HashMap<String, f64>> = response
            .error_for_status()
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        let mut prices = HashMap::new();
        for symbol in symbols {
            if let Some(id) = self.id_for(symbol) {
                if let Some(usd) = body.get(id).and_then(|entry| entry.get("usd")) {
                    prices.insert(symbol.clone(), *usd);
                }
            }
        }

        debug!(requested = symbols.len(), received = prices.len(), "baseline fetched");
        Ok(prices)
    }
}

// ---------------------------------------------------------------------------
// Static implementation (offline runs and tests)
// ---------------------------------------------------------------------------

/// Fixed in-memory price source.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    prices: HashMap<String, f64>,
}

impl StaticSource {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self { prices }
    }

    /// A plausible default universe for offline demo runs.
    pub fn with_defaults() -> Self {
        let prices = [
            ("BTC", 65_000.0),
            ("ETH", 3_200.0),
            ("USDT", 1.0),
            ("BNB", 560.0),
            ("ADA", 0.45),
        ]
        .into_iter()
        .map(|(sym, px)| (sym.to_string(), px))
        .collect();
        Self { prices }
    }
}

impl PriceSource for StaticSource {
    async fn fetch_baseline(&self, symbols: &[String]) -> EngineResult<HashMap<String, f64>> {
        Ok(symbols
            .iter()
            .filter_map(|sym| self.prices.get(sym).map(|px| (sym.clone(), *px)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coingecko_id_mapping_covers_default_universe() {
        let source = CoinGeckoSource::new();
        for sym in ["BTC", "ETH", "USDT", "BNB", "ADA"] {
            assert!(source.id_for(sym).is_some(), "missing id for {sym}");
        }
        assert_eq!(source.id_for("BTC"), Some("bitcoin"));
        assert_eq!(source.id_for("DOGE"), None);
    }

    #[tokio::test]
    async fn static_source_returns_requested_subset() {
        let source = StaticSource::with_defaults();
        let symbols = vec!["BTC".to_string(), "UNKNOWN".to_string()];
        let prices = source.fetch_baseline(&symbols).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["BTC"], 65_000.0);
    }

    #[tokio::test]
    async fn static_source_empty_request_is_empty() {
        let source = StaticSource::default();
        let prices = source.fetch_baseline(&[]).await.unwrap();
        assert!(prices.is_empty());
    }
}
