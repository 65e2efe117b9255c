//! Arbitrage detection
//!
//! Two detectors share the book store: the cross-exchange detector runs
//! on every book event and compares best prices for one symbol across
//! venues; the triangular detector sweeps each exchange on a fixed
//! interval looking for profitable conversion cycles.

mod cross;
mod triangular;

pub use cross::CrossExchangeDetector;
pub use triangular::TriangularDetector;

use crate::types::{ExchangeId, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A detected arbitrage opportunity, net of taker fees
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Opportunity {
    /// Buy on one exchange, sell the same symbol on another
    Cross {
        symbol: Symbol,
        buy_exchange: ExchangeId,
        sell_exchange: ExchangeId,
        buy_price: Decimal,
        sell_price: Decimal,
        net_profit_percent: Decimal,
        detected_at: DateTime<Utc>,
    },
    /// A profitable conversion cycle within a single exchange
    Triangular {
        exchange: ExchangeId,
        /// Currencies in execution order; first element repeats implicitly
        cycle: Vec<String>,
        implied_rate: Decimal,
        net_profit_percent: Decimal,
        detected_at: DateTime<Utc>,
    },
}

impl Opportunity {
    pub fn net_profit_percent(&self) -> Decimal {
        match self {
            Opportunity::Cross {
                net_profit_percent, ..
            }
            | Opportunity::Triangular {
                net_profit_percent, ..
            } => *net_profit_percent,
        }
    }
}
