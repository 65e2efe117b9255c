//! Shared read-only mirror of synchronized order books
//!
//! The synchronizer publishes a fresh `Arc<OrderBook>` after each fully
//! applied update, so readers always observe a complete book and never a
//! torn intermediate state.

use super::OrderBook;
use crate::types::{ExchangeId, PairId, Symbol};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Snapshot store keyed by (exchange, symbol)
pub struct BookStore {
    books: RwLock<HashMap<PairId, Arc<OrderBook>>>,
    max_age: chrono::Duration,
}

impl BookStore {
    /// Create a store; books older than `max_age` are hidden from
    /// freshness-checked reads
    pub fn new(max_age: chrono::Duration) -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    /// Publish a validated book, replacing any previous snapshot
    pub fn publish(&self, book: OrderBook) {
        let pair = book.pair.clone();
        self.books
            .write()
            .expect("book store lock poisoned")
            .insert(pair, Arc::new(book));
    }

    /// Discard the snapshot for a pair (corruption or unsubscribe)
    pub fn remove(&self, pair: &PairId) {
        self.books
            .write()
            .expect("book store lock poisoned")
            .remove(pair);
    }

    /// Latest snapshot for a pair regardless of age
    pub fn get(&self, pair: &PairId) -> Option<Arc<OrderBook>> {
        self.books
            .read()
            .expect("book store lock poisoned")
            .get(pair)
            .cloned()
    }

    /// Latest snapshot for a pair, only if fresh
    pub fn fresh(&self, pair: &PairId) -> Option<Arc<OrderBook>> {
        let now = Utc::now();
        self.get(pair).filter(|b| b.is_fresh(now, self.max_age))
    }

    /// Fresh snapshots of this symbol across all exchanges
    pub fn fresh_for_symbol(&self, symbol: &Symbol) -> Vec<Arc<OrderBook>> {
        let now = Utc::now();
        self.books
            .read()
            .expect("book store lock poisoned")
            .values()
            .filter(|b| &b.pair.symbol == symbol && b.is_fresh(now, self.max_age))
            .cloned()
            .collect()
    }

    /// Fresh snapshots of all books on one exchange
    pub fn fresh_for_exchange(&self, exchange: &ExchangeId) -> Vec<Arc<OrderBook>> {
        let now = Utc::now();
        self.books
            .read()
            .expect("book store lock poisoned")
            .values()
            .filter(|b| &b.pair.exchange == exchange && b.is_fresh(now, self.max_age))
            .cloned()
            .collect()
    }

    /// Number of published books
    pub fn len(&self) -> usize {
        self.books.read().expect("book store lock poisoned").len()
    }

    /// Whether no books are published
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{BookUpdate, PriceLevel};
    use rust_decimal_macros::dec;

    fn pair(exchange: &str, base: &str, quote: &str) -> PairId {
        PairId::new(ExchangeId::new(exchange), Symbol::new(base, quote))
    }

    fn book(pair: PairId, bid: rust_decimal::Decimal, ask: rust_decimal::Decimal) -> OrderBook {
        let mut b = OrderBook::new(pair);
        b.apply(BookUpdate {
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
        b
    }

    #[test]
    fn test_publish_and_get() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        let p = pair("binance", "BTC", "USDT");
        store.publish(book(p.clone(), dec!(100), dec!(101)));

        let snap = store.get(&p).unwrap();
        assert_eq!(snap.best_bid(), Some(dec!(100)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        let p = pair("binance", "BTC", "USDT");
        store.publish(book(p.clone(), dec!(100), dec!(101)));
        store.publish(book(p.clone(), dec!(105), dec!(106)));

        assert_eq!(store.get(&p).unwrap().best_bid(), Some(dec!(105)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        let p = pair("binance", "BTC", "USDT");
        store.publish(book(p.clone(), dec!(100), dec!(101)));
        store.remove(&p);
        assert!(store.get(&p).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_fresh_hides_old_books() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        let p = pair("binance", "BTC", "USDT");
        let mut b = book(p.clone(), dec!(100), dec!(101));
        b.updated_at = Utc::now() - chrono::Duration::seconds(60);
        store.publish(b);

        assert!(store.get(&p).is_some());
        assert!(store.fresh(&p).is_none());
    }

    #[test]
    fn test_fresh_for_symbol_spans_exchanges() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        store.publish(book(pair("binance", "BTC", "USDT"), dec!(100), dec!(101)));
        store.publish(book(pair("kraken", "BTC", "USDT"), dec!(102), dec!(103)));
        store.publish(book(pair("binance", "ETH", "USDT"), dec!(10), dec!(11)));

        let symbol = Symbol::new("BTC", "USDT");
        let books = store.fresh_for_symbol(&symbol);
        assert_eq!(books.len(), 2);
    }

    #[test]
    fn test_fresh_for_exchange() {
        let store = BookStore::new(chrono::Duration::seconds(10));
        store.publish(book(pair("binance", "BTC", "USDT"), dec!(100), dec!(101)));
        store.publish(book(pair("binance", "ETH", "USDT"), dec!(10), dec!(11)));
        store.publish(book(pair("kraken", "BTC", "USD"), dec!(99), dec!(100)));

        let books = store.fresh_for_exchange(&ExchangeId::new("binance"));
        assert_eq!(books.len(), 2);
    }
}
