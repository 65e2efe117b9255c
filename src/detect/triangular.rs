//! Triangular detection: negative-cycle search over one exchange's books
//!
//! Currencies are graph nodes, conversions are edges weighted
//! `-ln(effective_rate)` with the taker fee applied, so a conversion
//! cycle whose rate product exceeds 1 shows up as a negative cycle.
//! Bellman-Ford with all-zero initial distances finds such cycles in
//! every component; `f64` is confined to this log-space graph.

use super::Opportunity;
use crate::book::BookStore;
use crate::telemetry::metrics;
use crate::types::{ExchangeId, FeeSchedule};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

struct Edge {
    from: usize,
    to: usize,
    weight: f64,
    rate: f64,
}

/// Periodic per-exchange sweep for profitable conversion cycles
pub struct TriangularDetector {
    store: Arc<BookStore>,
    fees: FeeSchedule,
    min_profit_percent: Decimal,
    max_cycle_length: usize,
    max_currencies: usize,
}

impl TriangularDetector {
    pub fn new(
        store: Arc<BookStore>,
        fees: FeeSchedule,
        min_profit_percent: Decimal,
        max_cycle_length: usize,
        max_currencies: usize,
    ) -> Self {
        Self {
            store,
            fees,
            min_profit_percent,
            max_cycle_length,
            max_currencies,
        }
    }

    /// Run one sweep over an exchange's fresh books
    pub fn scan(&self, exchange: &ExchangeId) -> Vec<Opportunity> {
        let books = self.store.fresh_for_exchange(exchange);
        if books.is_empty() {
            return Vec::new();
        }
        let taker = self.fees.taker_rate(exchange);
        let fee_keep = 1.0 - decimal_to_f64(taker);

        // Deterministic node set, capped
        let mut currencies: BTreeSet<String> = BTreeSet::new();
        for book in &books {
            currencies.insert(book.pair.symbol.base.clone());
            currencies.insert(book.pair.symbol.quote.clone());
        }
        let currencies: Vec<String> = currencies.into_iter().take(self.max_currencies).collect();
        let index: HashMap<&str, usize> = currencies
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let n = currencies.len();
        if n < 3 {
            return Vec::new();
        }

        // Two directed edges per book; one-sided books contribute only
        // the direction they can price
        let mut edges = Vec::new();
        let mut rates: HashMap<(usize, usize), f64> = HashMap::new();
        for book in &books {
            let (Some(&base), Some(&quote)) = (
                index.get(book.pair.symbol.base.as_str()),
                index.get(book.pair.symbol.quote.as_str()),
            ) else {
                continue;
            };
            if let Some(bid) = book.best_bid() {
                let rate = decimal_to_f64(bid) * fee_keep;
                push_edge(&mut edges, &mut rates, base, quote, rate);
            }
            if let Some(ask) = book.best_ask() {
                let ask = decimal_to_f64(ask);
                if ask > 0.0 {
                    let rate = (1.0 / ask) * fee_keep;
                    push_edge(&mut edges, &mut rates, quote, base, rate);
                }
            }
        }
        if edges.is_empty() {
            return Vec::new();
        }

        // Bellman-Ford from a virtual super-source: all distances start
        // at zero so cycles in every component are reachable
        let mut dist = vec![0.0_f64; n];
        let mut pred: Vec<Option<usize>> = vec![None; n];
        for _ in 0..n.saturating_sub(1) {
            let mut changed = false;
            for e in &edges {
                if dist[e.from] + e.weight < dist[e.to] {
                    dist[e.to] = dist[e.from] + e.weight;
                    pred[e.to] = Some(e.from);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut flagged = Vec::new();
        for e in &edges {
            if dist[e.from] + e.weight < dist[e.to] {
                flagged.push(e.to);
            }
        }

        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut opportunities = Vec::new();
        for start in flagged {
            let Some(cycle) = extract_cycle(&pred, start, n) else {
                continue;
            };
            let normalized = normalize_rotation(&cycle);
            if !seen.insert(normalized.clone()) {
                continue;
            }
            if normalized.len() < 3 || normalized.len() > self.max_cycle_length {
                continue;
            }

            let mut product = 1.0_f64;
            let mut complete = true;
            for i in 0..normalized.len() {
                let from = normalized[i];
                let to = normalized[(i + 1) % normalized.len()];
                match rates.get(&(from, to)) {
                    Some(rate) => product *= rate,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete || !product.is_finite() {
                continue;
            }

            let Some(implied_rate) = Decimal::from_f64_retain(product) else {
                continue;
            };
            let implied_rate = implied_rate.round_dp(8);
            let net = (implied_rate - Decimal::ONE) * Decimal::ONE_HUNDRED;
            if net < self.min_profit_percent {
                continue;
            }

            let cycle_names: Vec<String> =
                normalized.iter().map(|&i| currencies[i].clone()).collect();
            tracing::info!(
                exchange = %exchange,
                cycle = %cycle_names.join("->"),
                implied_rate = %implied_rate,
                net_percent = %net,
                "Triangular opportunity"
            );
            metrics::record_opportunity("triangular");

            opportunities.push(Opportunity::Triangular {
                exchange: exchange.clone(),
                cycle: cycle_names,
                implied_rate,
                net_profit_percent: net,
                detected_at: Utc::now(),
            });
        }
        opportunities
    }
}

fn push_edge(
    edges: &mut Vec<Edge>,
    rates: &mut HashMap<(usize, usize), f64>,
    from: usize,
    to: usize,
    rate: f64,
) {
    if !(rate > 0.0 && rate.is_finite()) {
        return;
    }
    edges.push(Edge {
        from,
        to,
        weight: -rate.ln(),
        rate,
    });
    rates.insert((from, to), rate);
}

/// Walk predecessors into the cycle, then collect it in execution order
fn extract_cycle(pred: &[Option<usize>], start: usize, n: usize) -> Option<Vec<usize>> {
    // n hops guarantee we land on a node inside the cycle
    let mut node = start;
    for _ in 0..n {
        node = pred[node]?;
    }

    let anchor = node;
    let mut reversed = vec![anchor];
    let mut node = pred[anchor]?;
    while node != anchor {
        reversed.push(node);
        node = pred[node]?;
    }
    // Predecessor links run against edge direction
    reversed.reverse();
    Some(reversed)
}

/// Rotate a cycle so its smallest node comes first; rotations of the
/// same cycle then compare equal
fn normalize_rotation(cycle: &[usize]) -> Vec<usize> {
    let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &node)| node)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    let mut rotated = Vec::with_capacity(cycle.len());
    rotated.extend_from_slice(&cycle[min_pos..]);
    rotated.extend_from_slice(&cycle[..min_pos]);
    rotated
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
