//! Scripted in-memory connector for dry runs and deterministic tests
//!
//! Tickers, book update scripts, and injected faults are set up ahead of
//! time; subscriptions drain their script and then stay open so tests
//! can push further updates live.

use super::{ExchangeConnector, Ticker};
use crate::book::BookUpdate;
use crate::error::ConnectorError;
use crate::types::{ExchangeId, PairId, Symbol};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
struct SimState {
    tickers: HashMap<ExchangeId, Result<HashMap<Symbol, Ticker>, ConnectorError>>,
    scripts: HashMap<PairId, VecDeque<BookUpdate>>,
    subscribe_faults: HashMap<PairId, ConnectorError>,
    open: HashMap<PairId, mpsc::Sender<BookUpdate>>,
    subscribe_calls: HashMap<PairId, u32>,
}

/// Connector whose behavior is fully scripted by the caller
#[derive(Default)]
pub struct SimConnector {
    state: Mutex<SimState>,
}

impl SimConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ticker response for an exchange
    pub fn set_tickers(&self, exchange: ExchangeId, tickers: HashMap<Symbol, Ticker>) {
        self.lock().tickers.insert(exchange, Ok(tickers));
    }

    /// Make ticker fetches for an exchange fail
    pub fn fail_tickers(&self, exchange: ExchangeId, error: ConnectorError) {
        self.lock().tickers.insert(exchange, Err(error));
    }

    /// Queue a book update delivered on the next subscription to `pair`
    pub fn queue_update(&self, pair: PairId, update: BookUpdate) {
        self.lock().scripts.entry(pair).or_default().push_back(update);
    }

    /// Make subscriptions to `pair` fail until cleared
    pub fn fail_subscribe(&self, pair: PairId, error: ConnectorError) {
        self.lock().subscribe_faults.insert(pair, error);
    }

    /// Clear an injected subscription fault
    pub fn clear_subscribe_fault(&self, pair: &PairId) {
        self.lock().subscribe_faults.remove(pair);
    }

    /// Push an update into an already-open subscription
    ///
    /// Returns false if the pair has no open subscription.
    pub fn push_update(&self, pair: &PairId, update: BookUpdate) -> bool {
        let sender = self.lock().open.get(pair).cloned();
        match sender {
            Some(tx) => tx.try_send(update).is_ok(),
            None => false,
        }
    }

    /// Drop the feed for a pair, ending its stream
    pub fn drop_feed(&self, pair: &PairId) {
        self.lock().open.remove(pair);
    }

    /// Pairs with an open subscription right now
    pub fn active_subscriptions(&self) -> HashSet<PairId> {
        self.lock().open.keys().cloned().collect()
    }

    /// How many times `subscribe_order_book` was called for a pair
    pub fn subscribe_calls(&self, pair: &PairId) -> u32 {
        self.lock().subscribe_calls.get(pair).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().expect("sim connector lock poisoned")
    }
}

#[async_trait]
impl ExchangeConnector for SimConnector {
    async fn fetch_tickers(
        &self,
        exchange: &ExchangeId,
    ) -> Result<HashMap<Symbol, Ticker>, ConnectorError> {
        match self.lock().tickers.get(exchange) {
            Some(Ok(tickers)) => Ok(tickers.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(HashMap::new()),
        }
    }

    async fn subscribe_order_book(
        &self,
        pair: &PairId,
    ) -> Result<mpsc::Receiver<BookUpdate>, ConnectorError> {
        let (tx, rx) = mpsc::channel(256);
        {
            let mut state = self.lock();
            *state.subscribe_calls.entry(pair.clone()).or_insert(0) += 1;

            if let Some(err) = state.subscribe_faults.get(pair) {
                return Err(err.clone());
            }

            if let Some(script) = state.scripts.get_mut(pair) {
                while let Some(update) = script.pop_front() {
                    // Buffer is larger than any reasonable script
                    let _ = tx.try_send(update);
                }
            }

            state.open.insert(pair.clone(), tx);
        }
        Ok(rx)
    }

    async fn unsubscribe(&self, pair: &PairId) {
        self.lock().open.remove(pair);
    }
}
