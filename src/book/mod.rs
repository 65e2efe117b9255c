//! Order book state
//!
//! Live books are owned and mutated exclusively by the synchronizer;
//! everyone else reads immutable snapshots through the [`BookStore`].

mod store;

pub use store::BookStore;

use crate::types::PairId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Resting quantity at this price
    pub quantity: Decimal,
}

/// One incoming feed message: either a full snapshot or a delta
#[derive(Debug, Clone)]
pub struct BookUpdate {
    /// Bid levels; for deltas, a zero quantity removes the level
    pub bids: Vec<PriceLevel>,
    /// Ask levels; same delta semantics as bids
    pub asks: Vec<PriceLevel>,
    /// Full replacement rather than an incremental change
    pub is_snapshot: bool,
}

/// Integrity violations that force the book to be discarded
#[derive(Debug, Clone, thiserror::Error)]
pub enum BookIntegrityError {
    #[error("crossed book: bid {bid} >= ask {ask}")]
    Crossed { bid: Decimal, ask: Decimal },
    #[error("empty {0} side")]
    EmptySide(&'static str),
}

/// L2 order book for one (exchange, symbol)
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Identity of the book
    pub pair: PairId,
    /// Bid levels, sorted best (highest) to worst
    pub bids: Vec<PriceLevel>,
    /// Ask levels, sorted best (lowest) to worst
    pub asks: Vec<PriceLevel>,
    /// Last successfully applied update
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(pair: PairId) -> Self {
        Self {
            pair,
            bids: vec![],
            asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get spread as a fraction of the ask
    pub fn spread_percent(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if !ask.is_zero() => {
                Some((ask - bid) / ask * Decimal::ONE_HUNDRED)
            }
            _ => None,
        }
    }

    /// Whether the book was updated within `max_age` of `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.updated_at <= max_age
    }

    /// Apply one feed update in place
    ///
    /// Snapshots replace both sides; deltas upsert levels, removing any
    /// level whose quantity is zero. Sides stay sorted afterwards.
    pub fn apply(&mut self, update: BookUpdate) {
        if update.is_snapshot {
            self.bids = update.bids;
            self.asks = update.asks;
        } else {
            Self::merge_side(&mut self.bids, update.bids);
            Self::merge_side(&mut self.asks, update.asks);
        }
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
        self.updated_at = Utc::now();
    }

    fn merge_side(side: &mut Vec<PriceLevel>, changes: Vec<PriceLevel>) {
        for change in changes {
            if let Some(pos) = side.iter().position(|l| l.price == change.price) {
                if change.quantity.is_zero() {
                    side.remove(pos);
                } else {
                    side[pos].quantity = change.quantity;
                }
            } else if !change.quantity.is_zero() {
                side.push(change);
            }
        }
    }

    /// Check the invariants a published book must satisfy
    pub fn validate(&self) -> Result<(), BookIntegrityError> {
        let bid = self
            .best_bid()
            .ok_or(BookIntegrityError::EmptySide("bid"))?;
        let ask = self
            .best_ask()
            .ok_or(BookIntegrityError::EmptySide("ask"))?;
        if bid >= ask {
            return Err(BookIntegrityError::Crossed { bid, ask });
        }
        Ok(())
    }
}
