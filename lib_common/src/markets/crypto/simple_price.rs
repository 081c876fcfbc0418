//! # Simple-Price Source
//!
//! Reads one asset/currency pair from a nested price map such as
//! `{"tether": {"vnd": 25500}}`. Used for the USDT/VND exchange rate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::ingestors::{ExtractError, PriceSource};
use crate::markets::model::{RawReading, RawValue};
use crate::retrieve::HttpFetcher;

pub const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

#[derive(Debug, Clone)]
pub struct SimplePriceConfig {
    pub source_id: String,
    pub url: String,
    /// Asset id on the provider, e.g. `tether`.
    pub asset_id: String,
    /// Lower-case currency key, e.g. `vnd`.
    pub vs_currency: String,
}

impl SimplePriceConfig {
    pub fn usdt_vnd() -> Self {
        Self {
            source_id: "usdt_vnd".to_string(),
            url: COINGECKO_SIMPLE_PRICE_URL.to_string(),
            asset_id: "tether".to_string(),
            vs_currency: "vnd".to_string(),
        }
    }
}

pub fn nested_price(body: &Value, asset_id: &str, vs_currency: &str) -> Result<RawValue, String> {
    let asset = body
        .get(asset_id)
        .ok_or_else(|| format!("no entry for `{asset_id}`"))?;
    let price = asset
        .get(vs_currency)
        .ok_or_else(|| format!("`{asset_id}` has no `{vs_currency}` price"))?;
    RawValue::from_json(price).ok_or_else(|| format!("price is not a scalar: {price}"))
}

pub struct SimplePriceSource {
    config: SimplePriceConfig,
    fetcher: Arc<dyn HttpFetcher>,
}

impl SimplePriceSource {
    pub fn new(config: SimplePriceConfig, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { config, fetcher }
    }
}

#[async_trait]
impl PriceSource for SimplePriceSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        let id = self.id();
        let query = [
            ("ids", self.config.asset_id.clone()),
            ("vs_currencies", self.config.vs_currency.clone()),
        ];

        let started = Instant::now();
        let body = self
            .fetcher
            .get_json(&self.config.url, &query)
            .await
            .map_err(|e| ExtractError::from_fetch(id, e))?;
        debug!(source = id, elapsed_ms = started.elapsed().as_millis() as u64, "simple price fetched");

        let price = nested_price(&body, &self.config.asset_id, &self.config.vs_currency)
            .map_err(|detail| ExtractError::empty(id, detail))?;
        Ok(RawReading::now(id, price))
    }
}
