//! Reconnection policy for feed subscriptions
//!
//! Exponential backoff with equal jitter, an extended delay for
//! rate-limit faults, and a consecutive-failure budget. Permanent faults
//! and an exhausted budget both resolve to `Fail`; everything else is a
//! `Retry` after the computed delay.

use crate::config::BackoffConfig;
use crate::error::ConnectorError;
use rand::Rng;
use std::time::Duration;

/// What the supervisor should do about a fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultAction {
    /// Wait this long, then reconnect
    Retry(Duration),
    /// Mark the subscription Failed and stop
    Fail,
}

/// Per-subscription backoff and failure accounting
#[derive(Debug)]
pub struct Reconnector {
    config: BackoffConfig,
    consecutive_failures: u32,
}

impl Reconnector {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// A successfully applied update clears the failure budget
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Current consecutive failure count
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a connector fault and decide what to do next
    pub fn on_fault(&mut self, error: &ConnectorError) -> FaultAction {
        if error.is_permanent() {
            return FaultAction::Fail;
        }
        self.record(error.is_rate_limit())
    }

    /// Feed silence or a corrupt book: transient, retried with backoff
    pub fn on_resync(&mut self) -> FaultAction {
        self.record(false)
    }

    fn record(&mut self, rate_limited: bool) -> FaultAction {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures > self.config.max_consecutive_failures {
            return FaultAction::Fail;
        }
        FaultAction::Retry(self.delay(rate_limited))
    }

    /// Exponential delay with equal jitter: half deterministic, half random
    fn delay(&self, rate_limited: bool) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(16);
        let base = self
            .config
            .initial_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.max_delay_ms);
        let base = if rate_limited {
            base.saturating_mul(self.config.rate_limit_factor as u64)
                .min(self.config.max_delay_ms.saturating_mul(self.config.rate_limit_factor as u64))
        } else {
            base
        };
        let half = base / 2;
        let jitter = rand::thread_rng().gen_range(0..=half.max(1));
        Duration::from_millis(half + jitter)
    }
}
