//! Configuration loading tests

use arb_scout::config::Config;
use std::io::Write;

const EXAMPLE: &str = include_str!("../../config.toml.example");

#[test]
fn test_shipped_example_config_is_valid() {
    let config: Config = toml::from_str(EXAMPLE).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.exchanges.len(), 2);
    assert_eq!(config.exchanges[0].name, "binance");
    assert_eq!(config.telemetry.metrics_port, 9090);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE.as_bytes()).unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.filter.quote_currencies, vec!["USDT", "USD", "BTC"]);
    assert_eq!(config.backoff.max_consecutive_failures, 8);
}

#[test]
fn test_load_rejects_invalid_thresholds() {
    let broken = EXAMPLE.replace("min_profit_percent = 0.2", "min_profit_percent = 0");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(broken.as_bytes()).unwrap();

    assert!(Config::load(file.path()).is_err());
}
