//! # Retail Gold Price Page
//!
//! Reads the buy price of a gold product from a retailer's price table. The
//! table is filled in client-side, so the page goes through a real browser
//! (`PageRenderer`) before it is scanned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::browser::{PageRenderer, RenderRequest};
use crate::ingestors::{ExtractError, PriceSource};
use crate::markets::gold::table_scan::find_labeled_value;
use crate::markets::model::{RawReading, RawValue};

/// Where and how to look for the price.
#[derive(Debug, Clone)]
pub struct RetailPageConfig {
    pub source_id: String,
    pub url: String,
    /// Selector that must exist before the table is considered rendered.
    pub marker: String,
    /// Selector for candidate rows.
    pub row_selector: String,
    /// Accepted row labels; substring match, first matching row wins.
    pub labels: Vec<String>,
    /// Cells to the right of the label cell (1 = buy price).
    pub value_offset: usize,
    pub navigation_timeout: Duration,
    pub marker_timeout: Duration,
}

impl RetailPageConfig {
    /// SJC bar price from the SJC price board, buy column.
    pub fn sjc() -> Self {
        Self {
            source_id: "gold_sjc".to_string(),
            url: "https://sjc.com.vn/gia-vang-online".to_string(),
            marker: "table tr td".to_string(),
            row_selector: "table tr".to_string(),
            labels: vec!["Vàng miếng SJC".to_string(), "SJC 1L".to_string()],
            value_offset: 1,
            navigation_timeout: Duration::from_secs(60),
            marker_timeout: Duration::from_secs(30),
        }
    }
}

/// # Rendered-Page Gold Source
///
/// Renders the configured page, waits for its marker and pulls the text of
/// the cell next to the first label match.
///
/// ## Failures
/// * Marker never appears: `ExtractError::Timeout`.
/// * Browser could not start: `ExtractError::LaunchFailed`.
/// * No row matched: `ExtractError::NotFound`.
pub struct RetailGoldSource {
    config: RetailPageConfig,
    renderer: Arc<dyn PageRenderer>,
}

impl RetailGoldSource {
    pub fn new(config: RetailPageConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        Self { config, renderer }
    }

    pub fn config(&self) -> &RetailPageConfig {
        &self.config
    }
}

#[async_trait]
impl PriceSource for RetailGoldSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    async fn extract(&self) -> Result<RawReading, ExtractError> {
        let id = self.id();
        let request = RenderRequest {
            url: self.config.url.clone(),
            marker: self.config.marker.clone(),
            navigation_timeout: self.config.navigation_timeout,
            marker_timeout: self.config.marker_timeout,
        };

        let started = Instant::now();
        let html = self
            .renderer
            .render(&request)
            .await
            .map_err(|e| ExtractError::from_browser(id, e))?;
        debug!(source = id, bytes = html.len(), elapsed_ms = started.elapsed().as_millis() as u64, "page rendered");

        let labels: Vec<&str> = self.config.labels.iter().map(String::as_str).collect();
        let hit = find_labeled_value(&html, &self.config.row_selector, &labels, self.config.value_offset)
            .ok_or_else(|| ExtractError::NotFound {
                source_id: id.to_string(),
                detail: format!("no row labelled any of {:?} on {}", self.config.labels, self.config.url),
            })?;

        info!(source = id, label = %hit.label, value = %hit.value, "gold price located");
        Ok(RawReading::now(id, RawValue::Text(hit.value)))
    }
}
