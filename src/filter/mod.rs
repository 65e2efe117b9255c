//! Liquidity pair filter
//!
//! Periodically fetches 24h ticker metrics per exchange and admits the
//! pairs worth monitoring: allowed quote currency, enough volume, tight
//! enough spread. Each cycle diffs against the previous accepted set so
//! the synchronizer only subscribes and unsubscribes the changes.

use crate::config::FilterConfig;
use crate::connector::{ExchangeConnector, Ticker};
use crate::telemetry::metrics;
use crate::types::{ExchangeId, PairId, Symbol};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Subscribe/unsubscribe actions produced by one filter cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterDiff {
    pub added: BTreeSet<PairId>,
    pub removed: BTreeSet<PairId>,
}

impl FilterDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Evaluates liquidity criteria and tracks the accepted pair set
pub struct PairFilter {
    config: FilterConfig,
    exchanges: Vec<ExchangeId>,
    quotes: BTreeSet<String>,
    accepted: BTreeSet<PairId>,
}

impl PairFilter {
    pub fn new(config: FilterConfig, exchanges: Vec<ExchangeId>) -> Self {
        let quotes = config
            .quote_currencies
            .iter()
            .map(|q| q.to_uppercase())
            .collect();
        Self {
            config,
            exchanges,
            quotes,
            accepted: BTreeSet::new(),
        }
    }

    /// The currently accepted pair set
    pub fn accepted(&self) -> &BTreeSet<PairId> {
        &self.accepted
    }

    /// Whether one ticker passes all three liquidity criteria
    fn accepts(&self, symbol: &Symbol, ticker: &Ticker) -> bool {
        if !self.quotes.contains(&symbol.quote) {
            return false;
        }
        if ticker.volume_usd < self.config.min_volume_usd {
            return false;
        }
        if ticker.bid <= Decimal::ZERO || ticker.ask <= Decimal::ZERO {
            return false;
        }
        let spread_percent = (ticker.ask - ticker.bid) / ticker.ask * Decimal::ONE_HUNDRED;
        spread_percent <= self.config.max_spread_percent
    }

    /// Accepted pairs for one exchange's ticker response
    pub fn evaluate(
        &self,
        exchange: &ExchangeId,
        tickers: &HashMap<Symbol, Ticker>,
    ) -> BTreeSet<PairId> {
        tickers
            .iter()
            .filter(|(symbol, ticker)| self.accepts(symbol, ticker))
            .map(|(symbol, _)| PairId::new(exchange.clone(), symbol.clone()))
            .collect()
    }

    /// Run one full filter cycle across all exchanges
    ///
    /// A failing exchange keeps its previous pairs and is retried next
    /// cycle; it never blocks filtering of the others.
    pub async fn run_cycle<C: ExchangeConnector>(&mut self, connector: &C) -> FilterDiff {
        let mut next: BTreeSet<PairId> = BTreeSet::new();

        for exchange in self.exchanges.clone() {
            match connector.fetch_tickers(&exchange).await {
                Ok(tickers) => {
                    let pairs = self.evaluate(&exchange, &tickers);
                    tracing::info!(
                        exchange = %exchange,
                        tickers = tickers.len(),
                        accepted = pairs.len(),
                        "Filter cycle"
                    );
                    next.extend(pairs);
                }
                Err(e) => {
                    tracing::warn!(
                        exchange = %exchange,
                        error = %e,
                        "Ticker fetch failed, keeping previous pairs"
                    );
                    next.extend(
                        self.accepted
                            .iter()
                            .filter(|p| p.exchange == exchange)
                            .cloned(),
                    );
                }
            }
        }

        let diff = FilterDiff {
            added: next.difference(&self.accepted).cloned().collect(),
            removed: self.accepted.difference(&next).cloned().collect(),
        };

        if !diff.is_empty() {
            tracing::info!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                total = next.len(),
                "Filtered pair set changed"
            );
        }
        metrics::set_monitored_pairs(next.len());

        self.accepted = next;
        diff
    }
}
