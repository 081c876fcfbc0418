//! # Spot Ticker Source
//!
//! Latest traded price of one pair from an exchange ticker endpoint that
//! answers `{"symbol": "BTCUSDT", "price": "65000.50000000"}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::ingestors::{ExtractError, PriceSource};
use crate::markets::model::{RawReading, RawValue};
use crate::retrieve::HttpFetcher;

pub const BINANCE_TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price";

#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub source_id: String,
    pub url: String,
    /// Exchange pair, e.g. `BTCUSDT`.
    pub symbol: String,
}

impl TickerConfig {
    pub fn binance(source_id: &str, symbol: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            url: BINANCE_TICKER_URL.to_string(),
            symbol: symbol.to_string(),
        }
    }
}

/// Validates the ticker body and returns its price field.
pub fn ticker_price(body: &Value, expected_symbol: &str) -> Result<RawValue, String> {
    if let Some(symbol) = body.get("symbol").and_then(Value::as_str) {
        if !symbol.eq_ignore_ascii_case(expected_symbol) {
            return Err(format!("ticker answered for {symbol}, expected {expected_symbol}"));
        }
    }
    let price = body.get("price").ok_or_else(|| "ticker has no price".to_string())?;
    RawValue::from_json(price).ok_or_else(|| format!("ticker price is not a scalar: {price}"))
}

pub struct SpotTickerSource {
    config: TickerConfig,
    fetcher: Arc<dyn HttpFetcher>,
}

impl SpotTickerSource {
    pub fn new(config: TickerConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl PriceSource for SpotTickerSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        let id = self.id();
        let query = [("symbol", self.config.symbol.clone())];

        let started = Instant::now();
        let body = self
            .fetcher
            .get_json(&self.config.url, &query)
            .await
            .map_err(|e| ExtractError::from_fetch(id, e))?;
        debug!(source = id, symbol = %self.config.symbol, elapsed_ms = started.elapsed().as_millis() as u64, "ticker fetched");

        let price = ticker_price(&body, &self.config.symbol).map_err(|detail| ExtractError::empty(id, detail))?;
        Ok(RawReading::now(id, price))
    }
}
