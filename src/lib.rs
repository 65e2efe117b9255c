//! arb-scout: real-time crypto arbitrage detection engine
//!
//! This library provides the core components for:
//! - Liquidity-based pair filtering over REST ticker metrics
//! - Order book synchronization from exchange WebSocket feeds
//! - Reconnection with jittered exponential backoff
//! - Cross-exchange detection on every book update
//! - Triangular detection via negative-cycle search
//! - Opportunity fan-out to execution collaborators
//! - Full observability stack

pub mod book;
pub mod bus;
pub mod cli;
pub mod config;
pub mod connector;
pub mod detect;
pub mod engine;
pub mod error;
pub mod filter;
pub mod reconnect;
pub mod sync;
pub mod telemetry;
pub mod types;
pub mod ws;
