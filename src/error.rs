//! Fault taxonomy for connector and feed errors
//!
//! Transient and rate-limit faults are retried with backoff, corruption
//! forces a resync, and auth faults permanently fail the affected
//! subscription. None of these ever propagate beyond the (exchange,
//! symbol) they are scoped to.

use thiserror::Error;

/// Errors surfaced by exchange connectors
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// Timeout, dropped connection, or other recoverable network fault
    #[error("transient network fault: {0}")]
    Transient(String),

    /// Rate limit hit; transient but retried with an extended delay
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Credential or permission rejection; never retried
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Malformed or internally inconsistent feed data
    #[error("corrupt feed data: {0}")]
    Corrupt(String),

    /// Exchange not known to this connector
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
}

impl ConnectorError {
    /// Permanent faults mark the subscription Failed without retry
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::UnknownExchange(_))
    }

    /// Rate limits back off longer than ordinary transient faults
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
