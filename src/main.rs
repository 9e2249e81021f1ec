// =============================================================================
// Vega Paper Nexus - Demo Runner
// =============================================================================
//
// Wires the library together for a local run: restores persisted state,
// primes the simulator from the configured price source, then drives the
// price / mark-to-market / persistence loops until Ctrl+C.
//
// Set VEGA_OFFLINE=1 to run against a static price universe instead of the
// live baseline source, and VEGA_DEMO_SEED=1 to pre-populate a fresh ledger
// with a fabricated trade history.
// =============================================================================

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vega_paper::clock::{Clock, SystemClock};
use vega_paper::config::EngineConfig;
use vega_paper::engine::TradingEngine;
use vega_paper::ledger::PositionLedger;
use vega_paper::market::{CoinGeckoSource, PriceSimulator, PriceSource, StaticSource};
use vega_paper::notify::LogNotifier;
use vega_paper::persistence::{FileStore, KvStore};
use vega_paper::runtime::EngineRuntime;

const CONFIG_PATH: &str = "vega_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║            Vega Paper Nexus - Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        EngineConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("VEGA_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = EngineConfig::default().symbols;
    }

    info!(symbols = ?config.symbols, volatility = config.volatility_factor, "Configured assets");

    // ── 2. Build shared state ────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let simulator = Arc::new(PriceSimulator::new(
        config.volatility_factor,
        config.pegged_symbol.clone(),
    ));
    let ledger = Arc::new(PositionLedger::new(
        config.default_balance,
        config.forbid_negative_balance,
    ));
    let engine = Arc::new(TradingEngine::new(
        simulator.clone(),
        ledger.clone(),
        Arc::new(LogNotifier),
        clock.clone(),
        config.default_balance,
        config.forfeit_on_reset,
    ));

    // ── 3. Restore persisted ledger ──────────────────────────────────────
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&config.state_dir));
    let restored = match engine.restore(store.as_ref()) {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "Failed to restore persisted state, starting fresh");
            false
        }
    };
    if !restored {
        info!(balance = config.default_balance, "No persisted state, starting fresh");
        if std::env::var("VEGA_DEMO_SEED").is_ok() {
            let mut rng = StdRng::from_os_rng();
            vega_paper::seed::seed_demo_history(&ledger, clock.as_ref(), &mut rng, 15);
            info!("Demo trade history seeded");
        }
    }

    // ── 4. Launch the periodic loops ─────────────────────────────────────
    let runtime = EngineRuntime::new(
        simulator.clone(),
        engine.clone(),
        clock.clone(),
        config.clone(),
    );

    if std::env::var("VEGA_OFFLINE").is_ok() {
        info!("Offline mode: using the static price universe");
        launch_feed(&runtime, &simulator, Arc::new(StaticSource::with_defaults()), &config).await;
    } else {
        launch_feed(&runtime, &simulator, Arc::new(CoinGeckoSource::new()), &config).await;
    }

    runtime.spawn_mark_loop();
    runtime.spawn_persist_loop(store.clone());

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping gracefully");

    runtime.shutdown();

    if let Err(e) = engine.persist(store.as_ref()) {
        error!(error = %e, "Failed to persist ledger on shutdown");
    }
    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save config on shutdown");
    }

    info!("Vega Paper Nexus shut down complete.");
    Ok(())
}

/// Prime the simulator with one initial baseline fetch, then hand the source
/// to the price loop. A failed initial fetch only delays priming until the
/// loop's first successful refresh.
async fn launch_feed<S: PriceSource>(
    runtime: &EngineRuntime,
    simulator: &PriceSimulator,
    source: Arc<S>,
    config: &EngineConfig,
) {
    match source.fetch_baseline(&config.symbols).await {
        Ok(prices) if !prices.is_empty() => {
            simulator.apply_baseline(&prices);
            info!(count = prices.len(), "Initial baseline primed");
        }
        Ok(_) => warn!("Initial baseline fetch returned no prices"),
        Err(e) => warn!(error = %e, "Initial baseline fetch failed, will retry on refresh"),
    }

    runtime.spawn_price_loop(source);
}
