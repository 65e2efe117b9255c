//! Prometheus metrics
//!
//! Thin helpers over the `metrics` facade so call sites stay one-liners
//! and metric names live in one place.

use crate::types::ExchangeId;

/// Pairs currently accepted by the liquidity filter
pub fn set_monitored_pairs(count: usize) {
    metrics::gauge!("arbscout_monitored_pairs").set(count as f64);
}

/// Feed subscriptions with a live task
pub fn set_active_subscriptions(count: usize) {
    metrics::gauge!("arbscout_active_subscriptions").set(count as f64);
}

/// A fully applied and published book update
pub fn record_book_update(exchange: &ExchangeId) {
    metrics::counter!("arbscout_book_updates_total", "exchange" => exchange.to_string())
        .increment(1);
}

/// A forced resync (corrupt book or silent feed)
pub fn record_resync(exchange: &ExchangeId) {
    metrics::counter!("arbscout_resyncs_total", "exchange" => exchange.to_string()).increment(1);
}

/// A subscription marked Failed (permanent fault or exhausted budget)
pub fn record_subscription_failed(exchange: &ExchangeId) {
    metrics::counter!("arbscout_subscriptions_failed_total", "exchange" => exchange.to_string())
        .increment(1);
}

/// An emitted opportunity, by detector kind ("cross" or "triangular")
pub fn record_opportunity(kind: &'static str) {
    metrics::counter!("arbscout_opportunities_total", "kind" => kind).increment(1);
}
