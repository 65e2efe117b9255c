//! WebSocket plumbing for streaming connectors
//!
//! One client drives exactly one connection; retry and backoff decisions
//! belong to the reconnect policy supervising the subscription, not here.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
