//! Live exchange connector over REST + WebSocket
//!
//! Speaks a Binance-style wire format: a `/api/v3/ticker/24hr` style
//! REST endpoint for 24h ticker metrics and a `<symbol>@depth` partial
//! book stream delivering full top-of-book snapshots. Per-exchange base
//! URLs come from configuration, so any venue exposing this shape works.

use super::{ExchangeConnector, Ticker};
use crate::book::{BookUpdate, PriceLevel};
use crate::config::ExchangeConfig;
use crate::error::ConnectorError;
use crate::types::{ExchangeId, PairId, Symbol};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// REST/WebSocket endpoints for one exchange
#[derive(Debug, Clone)]
struct Endpoints {
    rest_url: String,
    ws_url: String,
}

/// Connector implementation for exchanges speaking the Binance wire shape
pub struct LiveConnector {
    endpoints: HashMap<ExchangeId, Endpoints>,
    /// Known quote currencies, longest first, for splitting joined symbols
    quotes: Vec<String>,
    http: reqwest::Client,
    streams: Mutex<HashMap<PairId, JoinHandle<()>>>,
}

impl LiveConnector {
    /// Build a connector from exchange configuration
    pub fn new(exchanges: &[ExchangeConfig], quote_currencies: &[String]) -> Self {
        let endpoints = exchanges
            .iter()
            .map(|e| {
                (
                    ExchangeId::new(&e.name),
                    Endpoints {
                        rest_url: e.rest_url.trim_end_matches('/').to_string(),
                        ws_url: e.ws_url.trim_end_matches('/').to_string(),
                    },
                )
            })
            .collect();

        let mut quotes: Vec<String> = quote_currencies
            .iter()
            .map(|q| q.to_uppercase())
            .collect();
        quotes.sort_by_key(|q| std::cmp::Reverse(q.len()));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoints,
            quotes,
            http,
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn endpoints(&self, exchange: &ExchangeId) -> Result<&Endpoints, ConnectorError> {
        self.endpoints
            .get(exchange)
            .ok_or_else(|| ConnectorError::UnknownExchange(exchange.to_string()))
    }

    /// Split a joined symbol like "BTCUSDT" on a known quote suffix
    fn split_symbol(&self, joined: &str) -> Option<Symbol> {
        let joined = joined.to_uppercase();
        for quote in &self.quotes {
            if let Some(base) = joined.strip_suffix(quote.as_str()) {
                if !base.is_empty() {
                    return Some(Symbol::new(base, quote));
                }
            }
        }
        None
    }

    fn classify_status(status: StatusCode, body: String) -> ConnectorError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectorError::Auth(body),
            _ => ConnectorError::Transient(format!("{}: {}", status, body)),
        }
    }

    fn parse_depth_message(text: &str) -> Option<BookUpdate> {
        let depth: DepthMessage = serde_json::from_str(text).ok()?;
        if depth.bids.is_empty() && depth.asks.is_empty() {
            return None;
        }
        Some(BookUpdate {
            bids: parse_levels(depth.bids),
            asks: parse_levels(depth.asks),
            is_snapshot: true,
        })
    }
}

/// Partial book depth message: arrays of [price, quantity] strings
#[derive(Debug, Deserialize)]
struct DepthMessage {
    #[serde(default)]
    bids: Vec<(String, String)>,
    #[serde(default)]
    asks: Vec<(String, String)>,
}

/// 24h ticker entry from the REST endpoint
#[derive(Debug, Deserialize)]
struct RestTicker {
    symbol: String,
    #[serde(rename = "bidPrice")]
    bid_price: String,
    #[serde(rename = "askPrice")]
    ask_price: String,
    #[serde(rename = "quoteVolume")]
    quote_volume: String,
}

fn parse_levels(raw: Vec<(String, String)>) -> Vec<PriceLevel> {
    raw.into_iter()
        .filter_map(|(price, quantity)| {
            Some(PriceLevel {
                price: Decimal::from_str(&price).ok()?,
                quantity: Decimal::from_str(&quantity).ok()?,
            })
        })
        .collect()
}

#[async_trait]
impl ExchangeConnector for LiveConnector {
    async fn fetch_tickers(
        &self,
        exchange: &ExchangeId,
    ) -> Result<HashMap<Symbol, Ticker>, ConnectorError> {
        let endpoints = self.endpoints(exchange)?;
        let url = format!("{}/api/v3/ticker/24hr", endpoints.rest_url);

        tracing::debug!(exchange = %exchange, url = %url, "Fetching tickers");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConnectorError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        let raw: Vec<RestTicker> = response
            .json()
            .await
            .map_err(|e| ConnectorError::Corrupt(e.to_string()))?;

        let mut tickers = HashMap::new();
        for entry in raw {
            let Some(symbol) = self.split_symbol(&entry.symbol) else {
                continue;
            };
            let (Ok(bid), Ok(ask), Ok(volume)) = (
                Decimal::from_str(&entry.bid_price),
                Decimal::from_str(&entry.ask_price),
                Decimal::from_str(&entry.quote_volume),
            ) else {
                continue;
            };
            if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
                continue;
            }
            tickers.insert(
                symbol,
                Ticker {
                    bid,
                    ask,
                    volume_usd: volume,
                },
            );
        }

        tracing::info!(exchange = %exchange, count = tickers.len(), "Fetched tickers");
        Ok(tickers)
    }

    async fn subscribe_order_book(
        &self,
        pair: &PairId,
    ) -> Result<mpsc::Receiver<BookUpdate>, ConnectorError> {
        let endpoints = self.endpoints(&pair.exchange)?;
        let stream_symbol = format!("{}{}", pair.symbol.base, pair.symbol.quote).to_lowercase();
        let url = format!("{}/{}@depth20@100ms", endpoints.ws_url, stream_symbol);

        tracing::debug!(pair = %pair, url = %url, "Opening book stream");

        let ws_config = WsConfig::new(url)
            .connect_timeout(Duration::from_secs(10))
            .ping_interval(Duration::from_secs(30));
        let mut ws_rx = WsClient::new(ws_config).connect();

        let (tx, rx) = mpsc::channel(256);
        let pair_for_task = pair.clone();
        let handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                match msg {
                    WsMessage::Text(text) => {
                        if let Some(update) = Self::parse_depth_message(&text) {
                            if tx.send(update).await.is_err() {
                                tracing::debug!(pair = %pair_for_task, "Update receiver dropped");
                                break;
                            }
                        }
                    }
                    WsMessage::Connected => {
                        tracing::debug!(pair = %pair_for_task, "Book stream connected");
                    }
                    WsMessage::Disconnected => {
                        tracing::debug!(pair = %pair_for_task, "Book stream disconnected");
                        break;
                    }
                    WsMessage::Binary(_) => {}
                }
            }
        });

        let mut streams = self.streams.lock().expect("stream map lock poisoned");
        if let Some(old) = streams.insert(pair.clone(), handle) {
            old.abort();
        }

        Ok(rx)
    }

    async fn unsubscribe(&self, pair: &PairId) {
        let handle = {
            let mut streams = self.streams.lock().expect("stream map lock poisoned");
            streams.remove(pair)
        };
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!(pair = %pair, "Unsubscribed book stream");
        }
    }
}
