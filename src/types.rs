//! Shared identity types: exchanges, symbols, monitored pairs, fees

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a configured exchange (lowercase name, e.g. "binance")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Create an exchange id, normalizing to lowercase
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_lowercase())
    }

    /// Exchange name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A base/quote currency pair, e.g. BTC/USDT
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    /// Base currency (the asset being priced)
    pub base: String,
    /// Quote currency (the asset prices are denominated in)
    pub quote: String,
}

impl Symbol {
    /// Create a symbol from base and quote currencies
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| SymbolParseError(s.to_string()))?;
        if base.is_empty() || quote.is_empty() {
            return Err(SymbolParseError(s.to_string()));
        }
        Ok(Symbol::new(base, quote))
    }
}

/// Error parsing a symbol string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid symbol: {0:?} (expected BASE/QUOTE)")]
pub struct SymbolParseError(pub String);

/// Identity of a monitored order book: one symbol on one exchange
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
}

impl PairId {
    pub fn new(exchange: ExchangeId, symbol: Symbol) -> Self {
        Self { exchange, symbol }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

/// Maker/taker fees for one exchange, in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub maker_bps: u32,
    pub taker_bps: u32,
}

impl Fees {
    /// Taker fee as a fraction (10 bps -> 0.0010)
    pub fn taker_rate(&self) -> Decimal {
        Decimal::new(self.taker_bps as i64, 4)
    }

    /// Maker fee as a fraction
    pub fn maker_rate(&self) -> Decimal {
        Decimal::new(self.maker_bps as i64, 4)
    }
}

impl Default for Fees {
    fn default() -> Self {
        // 10 bps, a common spot taker tier
        Self {
            maker_bps: 10,
            taker_bps: 10,
        }
    }
}

/// Read-only process-wide fee schedule, built once from configuration
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    fees: HashMap<ExchangeId, Fees>,
    fallback: Fees,
}

impl FeeSchedule {
    /// Build a schedule from per-exchange fees with a fallback for
    /// exchanges missing an entry
    pub fn new(fees: HashMap<ExchangeId, Fees>, fallback: Fees) -> Self {
        Self { fees, fallback }
    }

    /// Fees for an exchange, falling back to the default entry
    pub fn for_exchange(&self, exchange: &ExchangeId) -> Fees {
        self.fees.get(exchange).copied().unwrap_or(self.fallback)
    }

    /// Taker rate for an exchange as a fraction
    pub fn taker_rate(&self, exchange: &ExchangeId) -> Decimal {
        self.for_exchange(exchange).taker_rate()
    }
}
