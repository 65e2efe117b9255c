//! Order book synchronizer
//!
//! Owns one task per monitored pair. Each task drives the connector's
//! feed, applies updates to a privately owned book, validates it, and
//! publishes immutable snapshots plus a `BookEvent` notification. Feed
//! silence, corruption, and disconnects are routed through the
//! reconnect policy; permanent faults end the task in `Failed` until
//! the next filter cycle re-admits the pair.

use crate::book::{BookStore, OrderBook};
use crate::config::{BackoffConfig, SyncConfig};
use crate::connector::ExchangeConnector;
use crate::error::ConnectorError;
use crate::reconnect::{FaultAction, Reconnector};
use crate::telemetry::metrics;
use crate::types::PairId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Notification that a pair's book was successfully updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEvent {
    pub pair: PairId,
}

/// Per-subscription lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Synced,
    Stale,
    Resyncing,
    Failed,
}

impl SubscriptionState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Synced => "synced",
            Self::Stale => "stale",
            Self::Resyncing => "resyncing",
            Self::Failed => "failed",
        }
    }
}

/// Supervises one feed subscription task per monitored pair
pub struct Synchronizer<C: ExchangeConnector> {
    connector: Arc<C>,
    store: Arc<BookStore>,
    events: mpsc::Sender<BookEvent>,
    sync_config: SyncConfig,
    backoff_config: BackoffConfig,
    shutdown: watch::Receiver<bool>,
    tasks: Mutex<HashMap<PairId, JoinHandle<()>>>,
}

impl<C: ExchangeConnector> Synchronizer<C> {
    pub fn new(
        connector: Arc<C>,
        store: Arc<BookStore>,
        events: mpsc::Sender<BookEvent>,
        sync_config: SyncConfig,
        backoff_config: BackoffConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connector,
            store,
            events,
            sync_config,
            backoff_config,
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Bring active subscriptions in line with the accepted pair set
    ///
    /// Accepted pairs without a live task are (re)subscribed — this is
    /// also how `Failed` pairs get re-admitted after a filter cycle.
    /// Active pairs no longer accepted are unsubscribed.
    pub async fn reconcile(&self, accepted: &BTreeSet<PairId>) {
        let stale: Vec<PairId> = {
            let tasks = self.tasks.lock().expect("task map lock poisoned");
            tasks
                .keys()
                .filter(|pair| !accepted.contains(pair))
                .cloned()
                .collect()
        };
        for pair in stale {
            self.unsubscribe(&pair).await;
        }

        for pair in accepted {
            self.subscribe(pair.clone());
        }

        metrics::set_active_subscriptions(self.active_count());
    }

    /// Start a subscription task unless one is already live
    pub fn subscribe(&self, pair: PairId) {
        let mut tasks = self.tasks.lock().expect("task map lock poisoned");
        if let Some(existing) = tasks.get(&pair) {
            if !existing.is_finished() {
                return;
            }
        }

        let handle = tokio::spawn(run_subscription(
            Arc::clone(&self.connector),
            Arc::clone(&self.store),
            self.events.clone(),
            pair.clone(),
            self.sync_config.clone(),
            self.backoff_config.clone(),
            self.shutdown.clone(),
        ));
        tasks.insert(pair, handle);
    }

    /// Stop a subscription and discard its published book
    pub async fn unsubscribe(&self, pair: &PairId) {
        let handle = {
            let mut tasks = self.tasks.lock().expect("task map lock poisoned");
            tasks.remove(pair)
        };
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        self.connector.unsubscribe(pair).await;
        self.store.remove(pair);
        tracing::info!(pair = %pair, "Unsubscribed");
    }

    /// Number of live subscription tasks
    pub fn active_count(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("task map lock poisoned");
        tasks.retain(|_, handle| !handle.is_finished());
        tasks.len()
    }

    /// Await all subscription tasks; call after raising the shutdown flag
    ///
    /// Idempotent: a second call finds the task map already drained.
    pub async fn shutdown(&self) {
        let handles: Vec<(PairId, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock().expect("task map lock poisoned");
            tasks.drain().collect()
        };
        for (pair, handle) in handles {
            let _ = handle.await;
            self.connector.unsubscribe(&pair).await;
        }
        metrics::set_active_subscriptions(0);
    }
}

/// Drive one subscription until shutdown or permanent failure
async fn run_subscription<C: ExchangeConnector>(
    connector: Arc<C>,
    store: Arc<BookStore>,
    events: mpsc::Sender<BookEvent>,
    pair: PairId,
    sync_config: SyncConfig,
    backoff_config: BackoffConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reconnector = Reconnector::new(backoff_config);
    let mut state = SubscriptionState::Connecting;
    transition(&pair, state);

    'connect: loop {
        if *shutdown.borrow() {
            break;
        }

        let mut rx = match connector.subscribe_order_book(&pair).await {
            Ok(rx) => rx,
            Err(e) => {
                match handle_fault(&pair, &mut reconnector, &e).await {
                    Some(delay) => {
                        state = SubscriptionState::Connecting;
                        if wait_or_shutdown(delay, &mut shutdown).await {
                            break 'connect;
                        }
                        continue 'connect;
                    }
                    None => {
                        state = SubscriptionState::Failed;
                        transition(&pair, state);
                        store.remove(&pair);
                        connector.unsubscribe(&pair).await;
                        return;
                    }
                }
            }
        };

        // Each (re)connection starts from an empty book; the first
        // valid update repopulates it.
        let mut book = OrderBook::new(pair.clone());

        loop {
            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break 'connect;
                    }
                    continue;
                }
                received = tokio::time::timeout(sync_config.feed_silence(), rx.recv()) => received,
            };

            match received {
                Ok(Some(update)) => {
                    book.apply(update);
                    match book.validate() {
                        Ok(()) => {
                            store.publish(book.clone());
                            reconnector.on_success();
                            if state != SubscriptionState::Synced {
                                state = SubscriptionState::Synced;
                                transition(&pair, state);
                            }
                            metrics::record_book_update(&pair.exchange);
                            if events.send(BookEvent { pair: pair.clone() }).await.is_err() {
                                tracing::debug!(pair = %pair, "Event receiver gone, stopping");
                                break 'connect;
                            }
                        }
                        Err(violation) => {
                            tracing::warn!(pair = %pair, error = %violation, "Corrupt book, forcing resync");
                            store.remove(&pair);
                            metrics::record_resync(&pair.exchange);
                            match resync_delay(&pair, &mut reconnector) {
                                Some(delay) => {
                                    state = SubscriptionState::Resyncing;
                                    transition(&pair, state);
                                    if wait_or_shutdown(delay, &mut shutdown).await {
                                        break 'connect;
                                    }
                                    continue 'connect;
                                }
                                None => {
                                    state = SubscriptionState::Failed;
                                    transition(&pair, state);
                                    connector.unsubscribe(&pair).await;
                                    return;
                                }
                            }
                        }
                    }
                }
                Ok(None) => {
                    // Feed closed under us: transient disconnect
                    let fault = ConnectorError::Transient("feed stream ended".into());
                    match handle_fault(&pair, &mut reconnector, &fault).await {
                        Some(delay) => {
                            state = SubscriptionState::Resyncing;
                            transition(&pair, state);
                            if wait_or_shutdown(delay, &mut shutdown).await {
                                break 'connect;
                            }
                            continue 'connect;
                        }
                        None => {
                            state = SubscriptionState::Failed;
                            transition(&pair, state);
                            store.remove(&pair);
                            connector.unsubscribe(&pair).await;
                            return;
                        }
                    }
                }
                Err(_elapsed) => {
                    state = SubscriptionState::Stale;
                    transition(&pair, state);
                    tracing::warn!(
                        pair = %pair,
                        silence_secs = sync_config.feed_silence_secs,
                        "Feed silent, forcing resync"
                    );
                    store.remove(&pair);
                    metrics::record_resync(&pair.exchange);
                    match resync_delay(&pair, &mut reconnector) {
                        Some(delay) => {
                            state = SubscriptionState::Resyncing;
                            transition(&pair, state);
                            if wait_or_shutdown(delay, &mut shutdown).await {
                                break 'connect;
                            }
                            continue 'connect;
                        }
                        None => {
                            state = SubscriptionState::Failed;
                            transition(&pair, state);
                            connector.unsubscribe(&pair).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    // Shutdown path: release the feed, leave the last published book
    connector.unsubscribe(&pair).await;
    tracing::debug!(pair = %pair, "Subscription task stopped");
}

/// Classify a connector fault; Some(delay) to retry, None to fail
async fn handle_fault(
    pair: &PairId,
    reconnector: &mut Reconnector,
    error: &ConnectorError,
) -> Option<std::time::Duration> {
    match reconnector.on_fault(error) {
        FaultAction::Retry(delay) => {
            tracing::warn!(
                pair = %pair,
                error = %error,
                failures = reconnector.consecutive_failures(),
                delay_ms = delay.as_millis() as u64,
                "Feed fault, backing off"
            );
            Some(delay)
        }
        FaultAction::Fail => {
            tracing::error!(pair = %pair, error = %error, "Subscription failed permanently");
            metrics::record_subscription_failed(&pair.exchange);
            None
        }
    }
}

fn resync_delay(pair: &PairId, reconnector: &mut Reconnector) -> Option<std::time::Duration> {
    match reconnector.on_resync() {
        FaultAction::Retry(delay) => Some(delay),
        FaultAction::Fail => {
            tracing::error!(pair = %pair, "Resync budget exhausted, subscription failed");
            metrics::record_subscription_failed(&pair.exchange);
            None
        }
    }
}

/// Sleep for `delay`, returning true if shutdown was raised meanwhile
async fn wait_or_shutdown(delay: std::time::Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

fn transition(pair: &PairId, state: SubscriptionState) {
    tracing::info!(pair = %pair, state = state.as_str(), "Subscription state");
}
