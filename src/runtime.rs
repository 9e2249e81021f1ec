// =============================================================================
// Engine Runtime - periodic loops and clean shutdown
// =============================================================================
//
// One tokio task per concern:
//
//   * price loop    - simulator tick every `price_tick_secs`; baseline
//                     refresh runs in a sibling task on a coarser interval
//                     and its result is applied at the next tick boundary,
//                     keeping the fetch off the tick's critical path.
//   * mark loop     - mark-to-market sweep plus duration auto-close.
//   * persist loop  - periodic ledger checkpoint to the state store.
//
// Suspension points are only at the interval awaits. A `watch` channel
// cancels every loop; open trades survive shutdown through the store.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::TradingEngine;
use crate::market::{PriceSimulator, PriceSource};
use crate::persistence::KvStore;

/// Owns the shared handles and the shutdown signal for all periodic loops.
pub struct EngineRuntime {
    simulator: Arc<PriceSimulator>,
    engine: Arc<TradingEngine>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    shutdown: watch::Sender<bool>,
}

impl EngineRuntime {
    pub fn new(
        simulator: Arc<PriceSimulator>,
        engine: Arc<TradingEngine>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            simulator,
            engine,
            clock,
            config,
            shutdown,
        }
    }

    /// Signal every loop to stop after its current iteration.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    // -------------------------------------------------------------------------
    // Price loop
    // -------------------------------------------------------------------------

    /// Spawn the simulator tick loop plus its baseline-refresh sibling.
    pub fn spawn_price_loop<S: PriceSource>(&self, source: Arc<S>) -> JoinHandle<()> {
        let simulator = self.simulator.clone();
        let clock = self.clock.clone();
        let symbols = self.config.symbols.clone();
        let tick_every = Duration::from_secs(self.config.price_tick_secs.max(1));
        let refresh_every = Duration::from_secs(self.config.baseline_refresh_secs.max(1));
        let mut rx = self.shutdown.subscribe();
        let mut refresh_rx = self.shutdown.subscribe();

        // Latest fetched baseline, applied at the next tick boundary so the
        // fetch never sits inside the tick's critical section.
        let pending: Arc<Mutex<Option<HashMap<String, f64>>>> = Arc::new(Mutex::new(None));

        let fetch_pending = pending.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh_every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match source.fetch_baseline(&symbols).await {
                            Ok(prices) if !prices.is_empty() => {
                                *fetch_pending.lock() = Some(prices);
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(error = %e, "baseline refresh failed, keeping stale prices");
                            }
                        }
                    }
                    _ = refresh_rx.changed() => break,
                }
            }
        });

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Some(baseline) = pending.lock().take() {
                            simulator.apply_baseline(&baseline);
                        }
                        simulator.tick(clock.now_ms());
                    }
                    _ = rx.changed() => break,
                }
            }
            info!("price loop stopped");
        })
    }

    // -------------------------------------------------------------------------
    // Mark-to-market loop
    // -------------------------------------------------------------------------

    /// Spawn the mark-to-market and duration auto-close sweep.
    pub fn spawn_mark_loop(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let every = Duration::from_secs(self.config.mark_interval_secs.max(1));
        let mut rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => engine.tick(),
                    _ = rx.changed() => break,
                }
            }
            info!("mark-to-market loop stopped");
        })
    }

    // -------------------------------------------------------------------------
    // Persist loop
    // -------------------------------------------------------------------------

    /// Spawn the periodic ledger checkpoint.
    pub fn spawn_persist_loop(&self, store: Arc<dyn KvStore>) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let every = Duration::from_secs(self.config.persist_interval_secs.max(1));
        let mut rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = engine.persist(store.as_ref()) {
                            error!(error = %e, "ledger checkpoint failed");
                        }
                    }
                    _ = rx.changed() => break,
                }
            }
            info!("persist loop stopped");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::ledger::PositionLedger;
    use crate::market::StaticSource;
    use crate::notify::NullNotifier;
    use crate::persistence::MemoryStore;
    use crate::types::TradeSide;

    fn runtime() -> (EngineRuntime, Arc<PriceSimulator>, Arc<TradingEngine>) {
        let config = EngineConfig {
            price_tick_secs: 1,
            baseline_refresh_secs: 1,
            mark_interval_secs: 1,
            persist_interval_secs: 1,
            ..Default::default()
        };
        let simulator = Arc::new(PriceSimulator::with_seed(0.02, "USDT", 9));
        let ledger = Arc::new(PositionLedger::new(1_000.0, false));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let engine = Arc::new(TradingEngine::new(
            simulator.clone(),
            ledger,
            Arc::new(NullNotifier),
            clock.clone(),
            1_000.0,
            true,
        ));
        (
            EngineRuntime::new(simulator.clone(), engine.clone(), clock, config),
            simulator,
            engine,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn price_loop_primes_and_ticks() {
        let (runtime, simulator, _engine) = runtime();
        let handle = runtime.spawn_price_loop(Arc::new(StaticSource::with_defaults()));

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(simulator.is_primed("BTC"));
        assert_eq!(simulator.current_price("USDT"), Some(1.0));
        assert!(!simulator.history("BTC").is_empty());

        runtime.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mark_loop_revalues_open_trades() {
        let (runtime, simulator, engine) = runtime();
        simulator.prime("BTC", 50_000.0);
        let trade = engine.open("BTC/USDT", TradeSide::Buy, 100.0, 3_600).unwrap();

        let handle = runtime.spawn_mark_loop();
        simulator.prime("BTC", 55_000.0);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let open = engine.open_trades();
        let marked = open.iter().find(|t| t.id == trade.id).unwrap();
        assert!((marked.profit - 10.0).abs() < 1e-9);

        runtime.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn persist_loop_checkpoints_the_ledger() {
        let (runtime, _simulator, _engine) = runtime();
        let store = Arc::new(MemoryStore::new());
        let handle = runtime.spawn_persist_loop(store.clone());

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(store.load("ledger").unwrap().is_some());

        runtime.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_loops() {
        let (runtime, _simulator, _engine) = runtime();
        let h1 = runtime.spawn_price_loop(Arc::new(StaticSource::with_defaults()));
        let h2 = runtime.spawn_mark_loop();

        tokio::time::sleep(Duration::from_secs(1)).await;
        runtime.shutdown();

        h1.await.unwrap();
        h2.await.unwrap();
    }
}
