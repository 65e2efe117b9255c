//! Cross-exchange detection: buy cheap on one venue, sell dear on another

use super::Opportunity;
use crate::book::BookStore;
use crate::config::DetectionConfig;
use crate::telemetry::metrics;
use crate::types::{ExchangeId, FeeSchedule, Symbol};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type RouteKey = (Symbol, ExchangeId, ExchangeId);

/// Compares best prices for one symbol across exchanges on every book event
pub struct CrossExchangeDetector {
    store: Arc<BookStore>,
    fees: FeeSchedule,
    min_profit_percent: Decimal,
    epsilon: Decimal,
    /// Last emitted net profit per (symbol, buy, sell) route
    last_emitted: Mutex<HashMap<RouteKey, Decimal>>,
}

impl CrossExchangeDetector {
    pub fn new(store: Arc<BookStore>, fees: FeeSchedule, config: &DetectionConfig) -> Self {
        Self {
            store,
            fees,
            min_profit_percent: config.min_profit_percent,
            epsilon: config.profit_epsilon_percent,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate all ordered exchange pairs for a symbol
    ///
    /// Books that are stale, missing, or one-sided are skipped. Routes
    /// are debounced: a route re-emits only once its net profit moves
    /// beyond the configured epsilon, and the route resets when it drops
    /// below the threshold.
    pub fn on_book_event(&self, symbol: &Symbol) -> Vec<Opportunity> {
        let books = self.store.fresh_for_symbol(symbol);
        if books.len() < 2 {
            return Vec::new();
        }

        let mut opportunities = Vec::new();
        for buy in &books {
            for sell in &books {
                if buy.pair.exchange == sell.pair.exchange {
                    continue;
                }
                let (Some(buy_ask), Some(sell_bid)) = (buy.best_ask(), sell.best_bid()) else {
                    continue;
                };
                if buy_ask <= Decimal::ZERO {
                    continue;
                }

                let buy_taker = self.fees.taker_rate(&buy.pair.exchange);
                let sell_taker = self.fees.taker_rate(&sell.pair.exchange);
                let net_proceeds = sell_bid * (Decimal::ONE - sell_taker);
                let net_cost = buy_ask * (Decimal::ONE + buy_taker);
                let net = (net_proceeds - net_cost) / buy_ask * Decimal::ONE_HUNDRED;

                let key = (
                    symbol.clone(),
                    buy.pair.exchange.clone(),
                    sell.pair.exchange.clone(),
                );
                let mut last = self.last_emitted.lock().expect("route map lock poisoned");

                if net < self.min_profit_percent {
                    last.remove(&key);
                    continue;
                }
                if let Some(prev) = last.get(&key) {
                    if (net - prev).abs() <= self.epsilon {
                        continue;
                    }
                }
                last.insert(key, net);
                drop(last);

                let gross = (sell_bid - buy_ask) / buy_ask * Decimal::ONE_HUNDRED;
                tracing::info!(
                    symbol = %symbol,
                    buy_exchange = %buy.pair.exchange,
                    sell_exchange = %sell.pair.exchange,
                    buy_ask = %buy_ask,
                    sell_bid = %sell_bid,
                    gross_percent = %gross,
                    net_percent = %net,
                    "Cross-exchange opportunity"
                );
                metrics::record_opportunity("cross");

                opportunities.push(Opportunity::Cross {
                    symbol: symbol.clone(),
                    buy_exchange: buy.pair.exchange.clone(),
                    sell_exchange: sell.pair.exchange.clone(),
                    buy_price: buy_ask,
                    sell_price: sell_bid,
                    net_profit_percent: net,
                    detected_at: Utc::now(),
                });
            }
        }
        opportunities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookUpdate, OrderBook, PriceLevel};
    use crate::types::{Fees, PairId};
    use rust_decimal_macros::dec;

    fn publish(store: &BookStore, exchange: &str, bid: Decimal, ask: Decimal) {
        let pair = PairId::new(ExchangeId::new(exchange), Symbol::new("BTC", "USDT"));
        let mut book = OrderBook::new(pair);
        book.apply(BookUpdate {
            bids: vec![PriceLevel {
                price: bid,
                quantity: dec!(1),
            }],
            asks: vec![PriceLevel {
                price: ask,
                quantity: dec!(1),
            }],
            is_snapshot: true,
        });
        store.publish(book);
    }

    fn detector(store: Arc<BookStore>, min: Decimal) -> CrossExchangeDetector {
        let fees = FeeSchedule::new(
            HashMap::new(),
            Fees {
                maker_bps: 10,
                taker_bps: 10,
            },
        );
        CrossExchangeDetector::new(
            store,
            fees,
            &DetectionConfig {
                min_profit_percent: min,
                profit_epsilon_percent: dec!(0.05),
            },
        )
    }

    #[test]
    fn test_detects_profitable_route_net_of_fees() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        publish(&store, "binance", dec!(99.5), dec!(100));
        publish(&store, "kraken", dec!(101), dec!(101.5));

        let d = detector(store, dec!(0.5));
        let opps = d.on_book_event(&Symbol::new("BTC", "USDT"));

        // buy binance at 100, sell kraken at 101, 10 bps taker each leg:
        // (101 * 0.999 - 100 * 1.001) / 100 * 100 = 0.799
        assert_eq!(opps.len(), 1);
        match &opps[0] {
            Opportunity::Cross {
                buy_exchange,
                sell_exchange,
                buy_price,
                sell_price,
                net_profit_percent,
                ..
            } => {
                assert_eq!(buy_exchange, &ExchangeId::new("binance"));
                assert_eq!(sell_exchange, &ExchangeId::new("kraken"));
                assert_eq!(*buy_price, dec!(100));
                assert_eq!(*sell_price, dec!(101));
                assert_eq!(*net_profit_percent, dec!(0.799));
            }
            other => panic!("unexpected opportunity {other:?}"),
        }
    }

    #[test]
    fn test_fees_erase_gross_edge() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        // 0.1% gross, eaten entirely by 2x 10 bps taker fees
        publish(&store, "binance", dec!(99.5), dec!(100));
        publish(&store, "kraken", dec!(100.1), dec!(100.6));

        let d = detector(store, dec!(0.05));
        assert!(d.on_book_event(&Symbol::new("BTC", "USDT")).is_empty());
    }

    #[test]
    fn test_debounce_until_epsilon_move() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        publish(&store, "binance", dec!(99.5), dec!(100));
        publish(&store, "kraken", dec!(101), dec!(101.5));

        let d = detector(store.clone(), dec!(0.5));
        let symbol = Symbol::new("BTC", "USDT");

        assert_eq!(d.on_book_event(&symbol).len(), 1);
        // Unchanged books: debounced
        assert!(d.on_book_event(&symbol).is_empty());

        // A move within epsilon stays quiet
        publish(&store, "kraken", dec!(101.01), dec!(101.5));
        assert!(d.on_book_event(&symbol).is_empty());

        // Beyond epsilon: re-emitted
        publish(&store, "kraken", dec!(101.5), dec!(102));
        assert_eq!(d.on_book_event(&symbol).len(), 1);
    }

    #[test]
    fn test_route_resets_after_profit_collapses() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        publish(&store, "binance", dec!(99.5), dec!(100));
        publish(&store, "kraken", dec!(101), dec!(101.5));

        let d = detector(store.clone(), dec!(0.5));
        let symbol = Symbol::new("BTC", "USDT");
        assert_eq!(d.on_book_event(&symbol).len(), 1);

        // Profit disappears, then the identical opportunity returns
        publish(&store, "kraken", dec!(100), dec!(100.5));
        assert!(d.on_book_event(&symbol).is_empty());
        publish(&store, "kraken", dec!(101), dec!(101.5));
        assert_eq!(d.on_book_event(&symbol).len(), 1);
    }

    #[test]
    fn test_stale_book_skipped() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        publish(&store, "binance", dec!(99.5), dec!(100));

        let pair = PairId::new(ExchangeId::new("kraken"), Symbol::new("BTC", "USDT"));
        let mut old = OrderBook::new(pair);
        old.apply(BookUpdate {
            bids: vec![PriceLevel {
                price: dec!(101),
                quantity: dec!(1),
            }],
            asks: vec![PriceLevel {
                price: dec!(101.5),
                quantity: dec!(1),
            }],
            is_snapshot: true,
        });
        old.updated_at = Utc::now() - chrono::Duration::seconds(60);
        store.publish(old);

        let d = detector(store, dec!(0.5));
        assert!(d.on_book_event(&Symbol::new("BTC", "USDT")).is_empty());
    }

    #[test]
    fn test_single_exchange_is_quiet() {
        let store = Arc::new(BookStore::new(chrono::Duration::seconds(10)));
        publish(&store, "binance", dec!(99.5), dec!(100));

        let d = detector(store, dec!(0.1));
        assert!(d.on_book_event(&Symbol::new("BTC", "USDT")).is_empty());
    }
}
