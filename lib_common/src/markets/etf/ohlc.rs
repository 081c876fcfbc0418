//! # OHLC Time-Series Source
//!
//! Pulls daily candles for a trailing window and takes the last close as the
//! current price. The window is wider than one day so weekends and holidays
//! still leave at least one candle in the response.
//!
//! The endpoint answers with parallel arrays (`t`, `o`, `h`, `l`, `c`, `v`),
//! either at the top level or wrapped in a `data` object.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::ingestors::{ExtractError, PriceSource};
use crate::markets::model::{RawReading, RawValue};
use crate::retrieve::HttpFetcher;

#[derive(Debug, Clone)]
pub struct OhlcConfig {
    pub source_id: String,
    pub url: String,
    pub symbol: String,
    /// Candle size, `D` for daily.
    pub resolution: String,
    pub window_days: i64,
}

impl OhlcConfig {
    /// The VN30 ETF on the DNSE chart API, quoted in thousand VND.
    pub fn e1vfvn30() -> Self {
        Self {
            source_id: "etf_e1vfvn30".to_string(),
            url: "https://services.entrade.com.vn/chart-api/v2/ohlcs/stock".to_string(),
            symbol: "E1VFVN30".to_string(),
            resolution: "D".to_string(),
            window_days: 10,
        }
    }
}

/// Query pairs for the window `[now - days, now]`, bounds in unix seconds.
pub fn window_query(config: &OhlcConfig, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    let from = now - ChronoDuration::days(config.window_days);
    vec![
        ("symbol", config.symbol.clone()),
        ("resolution", config.resolution.clone()),
        ("from", from.timestamp().to_string()),
        ("to", now.timestamp().to_string()),
    ]
}

/// Last element of the close series, or a reason why there is none.
pub fn last_close(body: &Value) -> Result<RawValue, String> {
    let series = match body.get("data") {
        Some(Value::Null) | None => body,
        Some(inner) => inner,
    };
    if series.get("s").and_then(Value::as_str) == Some("no_data") {
        return Err("upstream reported no_data".to_string());
    }

    let closes = series
        .get("c")
        .and_then(Value::as_array)
        .ok_or_else(|| "close series `c` missing".to_string())?;
    let last = closes.last().ok_or_else(|| "close series is empty".to_string())?;
    RawValue::from_json(last).ok_or_else(|| format!("last close is not a scalar: {last}"))
}

/// # OHLC Series Source
///
/// One GET per extraction against the configured chart endpoint.
pub struct OhlcSeriesSource {
    config: OhlcConfig,
    fetcher: Arc<dyn HttpFetcher>,
}

impl OhlcSeriesSource {
    pub fn new(config: OhlcConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl PriceSource for OhlcSeriesSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        let id = self.id();
        let query = window_query(&self.config, Utc::now());

        let started = Instant::now();
        let body = self
            .fetcher
            .get_json(&self.config.url, &query)
            .await
            .map_err(|e| ExtractError::from_fetch(id, e))?;
        debug!(source = id, symbol = %self.config.symbol, elapsed_ms = started.elapsed().as_millis() as u64, "ohlc series fetched");

        let close = last_close(&body).map_err(|detail| ExtractError::empty(id, detail))?;
        Ok(RawReading::now(id, close))
    }
}
