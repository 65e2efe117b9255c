//! Engine wiring
//!
//! Owns the component graph for one run: startup probe, filter loop,
//! synchronizer, both detectors, and the opportunity bus. Every spawned
//! task watches the same shutdown flag; `run` returns only after all of
//! them have stopped, so nothing is published afterwards.

use crate::book::BookStore;
use crate::bus::OpportunityBus;
use crate::config::Config;
use crate::connector::ExchangeConnector;
use crate::detect::{CrossExchangeDetector, TriangularDetector};
use crate::filter::PairFilter;
use crate::sync::Synchronizer;
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// The arbitrage detection engine
pub struct Engine<C: ExchangeConnector> {
    config: Config,
    connector: Arc<C>,
    store: Arc<BookStore>,
    bus: Arc<OpportunityBus>,
    shutdown_tx: watch::Sender<bool>,
}

impl<C: ExchangeConnector> Engine<C> {
    pub fn new(config: Config, connector: C) -> Self {
        let store = Arc::new(BookStore::new(config.sync.max_book_age()));
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            connector: Arc::new(connector),
            store,
            bus: Arc::new(OpportunityBus::new()),
            shutdown_tx,
        }
    }

    /// The opportunity bus; subscribe before calling `run`
    pub fn bus(&self) -> Arc<OpportunityBus> {
        Arc::clone(&self.bus)
    }

    /// Shared book store (read-only snapshots)
    pub fn store(&self) -> Arc<BookStore> {
        Arc::clone(&self.store)
    }

    /// Raise the shutdown flag; idempotent, safe from any task
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Probe every configured exchange once; fatal only if all fail
    async fn probe_exchanges(&self) -> anyhow::Result<()> {
        let mut reachable = 0usize;
        for exchange in self.config.exchange_ids() {
            match self.connector.fetch_tickers(&exchange).await {
                Ok(tickers) => {
                    tracing::info!(exchange = %exchange, markets = tickers.len(), "Exchange ready");
                    reachable += 1;
                }
                Err(e) => {
                    tracing::warn!(exchange = %exchange, error = %e, "Exchange probe failed");
                }
            }
        }
        anyhow::ensure!(reachable > 0, "no configured exchange is reachable");
        Ok(())
    }

    /// Run until the shutdown flag is raised
    pub async fn run(&self) -> anyhow::Result<()> {
        self.probe_exchanges()
            .await
            .context("startup exchange probe")?;

        let fees = self.config.fee_schedule();
        let (event_tx, mut events) = mpsc::channel(self.config.sync.event_buffer);
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&self.connector),
            Arc::clone(&self.store),
            event_tx,
            self.config.sync.clone(),
            self.config.backoff.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let mut filter = PairFilter::new(self.config.filter.clone(), self.config.exchange_ids());

        // First filter cycle runs immediately so monitoring starts
        // without waiting a full refresh interval
        filter.run_cycle(self.connector.as_ref()).await;
        synchronizer.reconcile(filter.accepted()).await;

        let mut tasks: Vec<JoinHandle<()>> = Vec::new();
        tasks.push(self.spawn_filter_loop(filter, Arc::clone(&synchronizer)));
        for exchange in self.config.exchange_ids() {
            tasks.push(self.spawn_triangular_loop(exchange, fees.clone()));
        }

        // Cross-exchange detection runs inline on book events
        let cross = CrossExchangeDetector::new(
            Arc::clone(&self.store),
            fees,
            &self.config.detection,
        );
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    for opportunity in cross.on_book_event(&event.pair.symbol) {
                        self.bus.publish(opportunity);
                    }
                }
            }
        }

        tracing::info!("Shutting down");
        // Closing the event channel unblocks any task mid-send
        drop(events);
        synchronizer.shutdown().await;
        for task in tasks {
            let _ = task.await;
        }
        tracing::info!("Engine stopped");
        Ok(())
    }

    fn spawn_filter_loop(
        &self,
        mut filter: PairFilter,
        synchronizer: Arc<Synchronizer<C>>,
    ) -> JoinHandle<()> {
        let connector = Arc::clone(&self.connector);
        let interval = self.config.filter.refresh_interval();
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        filter.run_cycle(connector.as_ref()).await;
                        // Reconcile even on an unchanged set: pairs whose
                        // task failed since the last cycle get re-admitted
                        synchronizer.reconcile(filter.accepted()).await;
                    }
                }
            }
        })
    }

    fn spawn_triangular_loop(
        &self,
        exchange: crate::types::ExchangeId,
        fees: crate::types::FeeSchedule,
    ) -> JoinHandle<()> {
        let detector = TriangularDetector::new(
            Arc::clone(&self.store),
            fees,
            self.config.detection.min_profit_percent,
            self.config.triangular.max_cycle_length,
            self.config.triangular.max_currencies,
        );
        let bus = Arc::clone(&self.bus);
        let interval = self.config.triangular.interval();
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        for opportunity in detector.scan(&exchange) {
                            bus.publish(opportunity);
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookUpdate, PriceLevel};
    use crate::config::{
        BackoffConfig, DetectionConfig, ExchangeConfig, FilterConfig, SyncConfig, TelemetryConfig,
        TriangularConfig,
    };
    use crate::connector::{SimConnector, Ticker};
    use crate::detect::Opportunity;
    use crate::error::ConnectorError;
    use crate::types::{ExchangeId, PairId, Symbol};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            exchanges: vec![
                ExchangeConfig {
                    name: "binance".into(),
                    maker_fee_bps: 10,
                    taker_fee_bps: 10,
                    rest_url: "http://localhost".into(),
                    ws_url: "ws://localhost".into(),
                },
                ExchangeConfig {
                    name: "kraken".into(),
                    maker_fee_bps: 10,
                    taker_fee_bps: 10,
                    rest_url: "http://localhost".into(),
                    ws_url: "ws://localhost".into(),
                },
            ],
            filter: FilterConfig {
                quote_currencies: vec!["USDT".into()],
                min_volume_usd: dec!(1000000),
                max_spread_percent: dec!(2),
                refresh_minutes: 60,
            },
            sync: SyncConfig::default(),
            backoff: BackoffConfig {
                initial_delay_ms: 5,
                max_delay_ms: 20,
                max_consecutive_failures: 3,
                rate_limit_factor: 2,
            },
            detection: DetectionConfig {
                min_profit_percent: dec!(0.5),
                profit_epsilon_percent: dec!(0.05),
            },
            triangular: TriangularConfig::default(),
            telemetry: TelemetryConfig {
                metrics_port: 0,
                log_level: "warn".into(),
            },
        }
    }

    fn liquid_ticker() -> Ticker {
        Ticker {
            bid: dec!(100),
            ask: dec!(100.1),
            volume_usd: dec!(2000000),
        }
    }

    fn snapshot(bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> BookUpdate {
        BookUpdate {
            bids: vec![PriceLevel {
                price: bid,
                quantity: dec!(1),
            }],
            asks: vec![PriceLevel {
                price: ask,
                quantity: dec!(1),
            }],
            is_snapshot: true,
        }
    }

    #[tokio::test]
    async fn test_all_probes_failing_is_fatal() {
        let sim = SimConnector::new();
        sim.fail_tickers(
            ExchangeId::new("binance"),
            ConnectorError::Transient("down".into()),
        );
        sim.fail_tickers(
            ExchangeId::new("kraken"),
            ConnectorError::Transient("down".into()),
        );

        let engine = Engine::new(test_config(), sim);
        assert!(engine.run().await.is_err());
    }

    #[tokio::test]
    async fn test_partial_probe_failure_continues() {
        let sim = SimConnector::new();
        let mut tickers = HashMap::new();
        tickers.insert(Symbol::new("BTC", "USDT"), liquid_ticker());
        sim.set_tickers(ExchangeId::new("binance"), tickers);
        sim.fail_tickers(
            ExchangeId::new("kraken"),
            ConnectorError::Transient("down".into()),
        );

        let engine = Arc::new(Engine::new(test_config(), sim));
        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("engine did not stop")
            .expect("runner panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cross_opportunity_reaches_bus() {
        let sim = SimConnector::new();
        let symbol = Symbol::new("BTC", "USDT");
        let binance = ExchangeId::new("binance");
        let kraken = ExchangeId::new("kraken");

        let mut tickers = HashMap::new();
        tickers.insert(symbol.clone(), liquid_ticker());
        sim.set_tickers(binance.clone(), tickers.clone());
        sim.set_tickers(kraken.clone(), tickers);

        // Binance asks 100, Kraken bids 101: 0.799% net at 10 bps legs
        sim.queue_update(
            PairId::new(binance, symbol.clone()),
            snapshot(dec!(99.5), dec!(100)),
        );
        sim.queue_update(
            PairId::new(kraken, symbol.clone()),
            snapshot(dec!(101), dec!(101.5)),
        );

        let engine = Arc::new(Engine::new(test_config(), sim));
        let mut opportunities = engine.bus().subscribe();
        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };

        let opportunity = tokio::time::timeout(Duration::from_secs(2), opportunities.recv())
            .await
            .expect("no opportunity emitted")
            .expect("bus closed");
        match opportunity {
            Opportunity::Cross {
                net_profit_percent, ..
            } => assert_eq!(net_profit_percent, dec!(0.799)),
            other => panic!("unexpected opportunity {other:?}"),
        }

        engine.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("engine did not stop");

        // The debounced route emitted exactly once; nothing more is
        // published after shutdown completes
        assert!(opportunities.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let sim = SimConnector::new();
        let mut tickers = HashMap::new();
        tickers.insert(Symbol::new("BTC", "USDT"), liquid_ticker());
        sim.set_tickers(ExchangeId::new("binance"), tickers.clone());
        sim.set_tickers(ExchangeId::new("kraken"), tickers);

        let engine = Arc::new(Engine::new(test_config(), sim));
        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        engine.shutdown();
        engine.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("engine did not stop")
            .expect("runner panicked");
        assert!(result.is_ok());
    }
}
