//! Opportunity fan-out
//!
//! Execution collaborators subscribe and receive every emitted
//! opportunity over an unbounded channel: at-least-once delivery, FIFO
//! per publisher. Subscribers that drop their receiver are pruned on the
//! next publish.

use crate::detect::Opportunity;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Broadcast hub for detected opportunities
#[derive(Default)]
pub struct OpportunityBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Opportunity>>>,
}

impl OpportunityBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber; it receives opportunities published
    /// from this point on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Opportunity> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push(tx);
        rx
    }

    /// Deliver an opportunity to every live subscriber
    pub fn publish(&self, opportunity: Opportunity) {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned");
        subscribers.retain(|tx| tx.send(opportunity.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExchangeId, Symbol};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn opportunity(net: rust_decimal::Decimal) -> Opportunity {
        Opportunity::Cross {
            symbol: Symbol::new("BTC", "USDT"),
            buy_exchange: ExchangeId::new("binance"),
            sell_exchange: ExchangeId::new("kraken"),
            buy_price: dec!(100),
            sell_price: dec!(101),
            net_profit_percent: net,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let bus = OpportunityBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(opportunity(dec!(0.5)));
        bus.publish(opportunity(dec!(0.7)));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().net_profit_percent(), dec!(0.5));
            assert_eq!(rx.recv().await.unwrap().net_profit_percent(), dec!(0.7));
        }
    }

    #[tokio::test]
    async fn test_dropped_subscriber_pruned() {
        let bus = OpportunityBus::new();
        let rx = bus.subscribe();
        let mut live = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        bus.publish(opportunity(dec!(0.5)));

        assert_eq!(bus.subscriber_count(), 1);
        assert!(live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = OpportunityBus::new();
        bus.publish(opportunity(dec!(0.5)));

        let mut rx = bus.subscribe();
        bus.publish(opportunity(dec!(0.7)));

        assert_eq!(rx.recv().await.unwrap().net_profit_percent(), dec!(0.7));
        assert!(rx.try_recv().is_err());
    }
}
