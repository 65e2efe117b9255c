//! Configuration types for arb-scout
//!
//! Loaded once from TOML at startup and injected into each component;
//! immutable for the life of a run. Validation failures here are the
//! only fatal configuration faults.

use crate::types::{ExchangeId, FeeSchedule, Fees};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub exchanges: Vec<ExchangeConfig>,
    pub filter: FilterConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub triangular: TriangularConfig,
    pub telemetry: TelemetryConfig,
}

/// One monitored exchange: identity, fees, and connector endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    /// Maker fee in basis points
    pub maker_fee_bps: u32,
    /// Taker fee in basis points
    pub taker_fee_bps: u32,
    /// REST base URL for ticker fetches
    pub rest_url: String,
    /// WebSocket base URL for order book streams
    pub ws_url: String,
}

/// Liquidity filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Quote currencies admitted to monitoring
    pub quote_currencies: Vec<String>,
    /// Minimum 24h quote volume in USD
    pub min_volume_usd: Decimal,
    /// Maximum accepted spread, in percent of the ask
    pub max_spread_percent: Decimal,
    /// Minutes between filter refreshes
    pub refresh_minutes: u64,
}

impl FilterConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes * 60)
    }
}

/// Order book synchronizer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds of feed silence before a forced resync
    #[serde(default = "default_feed_silence_secs")]
    pub feed_silence_secs: u64,
    /// Seconds after which a published book is considered stale by readers
    #[serde(default = "default_max_book_age_secs")]
    pub max_book_age_secs: u64,
    /// Buffer size for book update notifications
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_feed_silence_secs() -> u64 {
    30
}
fn default_max_book_age_secs() -> u64 {
    10
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            feed_silence_secs: 30,
            max_book_age_secs: 10,
            event_buffer: 1024,
        }
    }
}

impl SyncConfig {
    pub fn feed_silence(&self) -> Duration {
        Duration::from_secs(self.feed_silence_secs)
    }

    pub fn max_book_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_book_age_secs as i64)
    }
}

/// Reconnection backoff configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the retry delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive failures before a subscription is marked Failed
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
    /// Multiplier applied to the delay for rate-limit faults
    #[serde(default = "default_rate_limit_factor")]
    pub rate_limit_factor: u32,
}

fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_max_failures() -> u32 {
    8
}
fn default_rate_limit_factor() -> u32 {
    4
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            max_consecutive_failures: 8,
            rate_limit_factor: 4,
        }
    }
}

/// Cross-exchange detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum net profit, in percent, to emit an opportunity
    pub min_profit_percent: Decimal,
    /// Profit change required to re-emit a debounced triple, in percent
    #[serde(default = "default_profit_epsilon")]
    pub profit_epsilon_percent: Decimal,
}

fn default_profit_epsilon() -> Decimal {
    Decimal::new(5, 2) // 0.05%
}

/// Triangular detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TriangularConfig {
    /// Seconds between sweeps of each exchange
    #[serde(default = "default_triangular_interval")]
    pub interval_secs: u64,
    /// Maximum currencies in a reported cycle
    #[serde(default = "default_max_cycle_len")]
    pub max_cycle_length: usize,
    /// Cap on currencies considered per exchange per sweep
    #[serde(default = "default_max_currencies")]
    pub max_currencies: usize,
}

fn default_triangular_interval() -> u64 {
    5
}
fn default_max_cycle_len() -> usize {
    4
}
fn default_max_currencies() -> usize {
    64
}

impl Default for TriangularConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_cycle_length: 4,
            max_currencies: 64,
        }
    }
}

impl TriangularConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub metrics_port: u16,
    pub log_level: String,
}

/// Configuration validation errors, fatal at startup only
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no exchanges configured")]
    NoExchanges,
    #[error("duplicate exchange: {0}")]
    DuplicateExchange(String),
    #[error("no quote currencies configured")]
    NoQuoteCurrencies,
    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: String },
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate thresholds and cross-references
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::NoExchanges);
        }
        let mut seen = std::collections::HashSet::new();
        for ex in &self.exchanges {
            if !seen.insert(ex.name.to_lowercase()) {
                return Err(ConfigError::DuplicateExchange(ex.name.clone()));
            }
        }
        if self.filter.quote_currencies.is_empty() {
            return Err(ConfigError::NoQuoteCurrencies);
        }
        if self.filter.min_volume_usd < Decimal::ZERO {
            return Err(ConfigError::InvalidThreshold {
                name: "filter.min_volume_usd",
                value: self.filter.min_volume_usd.to_string(),
            });
        }
        if self.filter.max_spread_percent <= Decimal::ZERO {
            return Err(ConfigError::InvalidThreshold {
                name: "filter.max_spread_percent",
                value: self.filter.max_spread_percent.to_string(),
            });
        }
        if self.detection.min_profit_percent <= Decimal::ZERO {
            return Err(ConfigError::InvalidThreshold {
                name: "detection.min_profit_percent",
                value: self.detection.min_profit_percent.to_string(),
            });
        }
        if self.triangular.max_cycle_length < 3 {
            return Err(ConfigError::InvalidThreshold {
                name: "triangular.max_cycle_length",
                value: self.triangular.max_cycle_length.to_string(),
            });
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return Err(ConfigError::InvalidThreshold {
                name: "backoff.max_delay_ms",
                value: self.backoff.max_delay_ms.to_string(),
            });
        }
        Ok(())
    }

    /// Exchange ids in configuration order
    pub fn exchange_ids(&self) -> Vec<ExchangeId> {
        self.exchanges
            .iter()
            .map(|e| ExchangeId::new(&e.name))
            .collect()
    }

    /// Build the process-wide fee schedule
    pub fn fee_schedule(&self) -> FeeSchedule {
        let mut fees = HashMap::new();
        for ex in &self.exchanges {
            fees.insert(
                ExchangeId::new(&ex.name),
                Fees {
                    maker_bps: ex.maker_fee_bps,
                    taker_bps: ex.taker_fee_bps,
                },
            );
        }
        FeeSchedule::new(fees, Fees::default())
    }
}
