//! End-to-end engine tests against the scripted sim connector

use arb_scout::book::{BookUpdate, PriceLevel};
use arb_scout::config::{
    BackoffConfig, Config, DetectionConfig, ExchangeConfig, FilterConfig, SyncConfig,
    TelemetryConfig, TriangularConfig,
};
use arb_scout::connector::{SimConnector, Ticker};
use arb_scout::detect::Opportunity;
use arb_scout::engine::Engine;
use arb_scout::error::ConnectorError;
use arb_scout::types::{ExchangeId, PairId, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn exchange(name: &str) -> ExchangeConfig {
    ExchangeConfig {
        name: name.to_string(),
        maker_fee_bps: 10,
        taker_fee_bps: 10,
        rest_url: "http://localhost".into(),
        ws_url: "ws://localhost".into(),
    }
}

fn config() -> Config {
    Config {
        exchanges: vec![exchange("binance"), exchange("kraken")],
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

fn liquid_tickers() -> HashMap<Symbol, Ticker> {
    let mut tickers = HashMap::new();
    tickers.insert(
        Symbol::new("BTC", "USDT"),
        Ticker {
            bid: dec!(100),
            ask: dec!(100.1),
            volume_usd: dec!(2000000),
        },
    );
    tickers
}

fn snapshot(bid: Decimal, ask: Decimal) -> BookUpdate {
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
async fn test_filter_to_bus_pipeline() {
    let sim = SimConnector::new();
    let symbol = Symbol::new("BTC", "USDT");
    let binance = ExchangeId::new("binance");
    let kraken = ExchangeId::new("kraken");

    sim.set_tickers(binance.clone(), liquid_tickers());
    sim.set_tickers(kraken.clone(), liquid_tickers());
    sim.queue_update(
        PairId::new(binance.clone(), symbol.clone()),
        snapshot(dec!(99.5), dec!(100)),
    );
    sim.queue_update(
        PairId::new(kraken.clone(), symbol.clone()),
        snapshot(dec!(101), dec!(101.5)),
    );

    let engine = Arc::new(Engine::new(config(), sim));
    let store = engine.store();
    let mut opportunities = engine.bus().subscribe();
    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run().await })
    };

    let opportunity = tokio::time::timeout(Duration::from_secs(2), opportunities.recv())
        .await
        .expect("no opportunity within deadline")
        .expect("bus closed");

    match opportunity {
        Opportunity::Cross {
            buy_exchange,
            sell_exchange,
            net_profit_percent,
            ..
        } => {
            assert_eq!(buy_exchange, binance);
            assert_eq!(sell_exchange, kraken);
            assert_eq!(net_profit_percent, dec!(0.799));
        }
        other => panic!("unexpected opportunity {other:?}"),
    }

    // Both books made it into the store along the way
    assert!(store.get(&PairId::new(binance, symbol.clone())).is_some());
    assert!(store.get(&PairId::new(kraken, symbol)).is_some());

    engine.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("engine did not stop")
        .expect("runner panicked");
    assert!(result.is_ok());
    assert!(opportunities.try_recv().is_err(), "no events after shutdown");
}

#[tokio::test]
async fn test_permanent_fault_isolated_to_one_exchange() {
    let sim = SimConnector::new();
    let symbol = Symbol::new("BTC", "USDT");
    let binance = ExchangeId::new("binance");
    let kraken = ExchangeId::new("kraken");

    sim.set_tickers(binance.clone(), liquid_tickers());
    sim.set_tickers(kraken.clone(), liquid_tickers());
    sim.queue_update(
        PairId::new(binance.clone(), symbol.clone()),
        snapshot(dec!(99.5), dec!(100)),
    );
    // Kraken's feed rejects the subscription outright
    sim.fail_subscribe(
        PairId::new(kraken.clone(), symbol.clone()),
        ConnectorError::Auth("key revoked".into()),
    );

    let engine = Arc::new(Engine::new(config(), sim));
    let store = engine.store();
    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run().await })
    };

    // The healthy exchange keeps publishing
    tokio::time::timeout(Duration::from_secs(2), async {
        while store.get(&PairId::new(binance.clone(), symbol.clone())).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("healthy exchange never published");

    assert!(store.get(&PairId::new(kraken, symbol)).is_none());

    engine.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("engine did not stop")
        .expect("runner panicked");
    assert!(result.is_ok());
}
