//! Exchange connector seam
//!
//! Everything upstream of the engine talks to exchanges through the
//! [`ExchangeConnector`] trait: REST ticker metrics for filtering and a
//! streaming order book feed per monitored pair. Any implementation is
//! interchangeable — the live wire connector, the scripted sim
//! connector, or a test double.

mod live;
mod sim;

pub use live::LiveConnector;
pub use sim::SimConnector;

use crate::book::BookUpdate;
use crate::error::ConnectorError;
use crate::types::{ExchangeId, PairId, Symbol};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// 24h ticker metrics for one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    /// Best bid price
    pub bid: Decimal,
    /// Best ask price
    pub ask: Decimal,
    /// 24h volume in quote/USD terms
    pub volume_usd: Decimal,
}

/// Capability every exchange integration must provide
#[async_trait]
pub trait ExchangeConnector: Send + Sync + 'static {
    /// Fetch ticker metrics for every spot symbol on an exchange
    async fn fetch_tickers(
        &self,
        exchange: &ExchangeId,
    ) -> Result<HashMap<Symbol, Ticker>, ConnectorError>;

    /// Open a streaming order book feed for one pair
    ///
    /// The stream ends (receiver yields `None`) when the underlying
    /// connection is gone; resubscribing is the caller's decision.
    async fn subscribe_order_book(
        &self,
        pair: &PairId,
    ) -> Result<mpsc::Receiver<BookUpdate>, ConnectorError>;

    /// Release the feed for one pair
    async fn unsubscribe(&self, pair: &PairId);
}
