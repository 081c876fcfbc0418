//! # Data Ingestors Module
//!
//! The capability every price adapter implements. An adapter performs exactly
//! one extraction per call against one upstream and returns a `RawReading`;
//! it knows nothing about normalization, conversion or where the value ends
//! up. Concrete adapters live under `markets`.
//!
//! Two extraction strategies exist in practice:
//! - **Rendered page**: navigate, wait for a structural marker, scan the DOM.
//! - **REST**: one GET, validate the shape, pick the current value.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::BrowserError;
use crate::markets::model::RawReading;
use crate::retrieve::FetchError;

/// Why an adapter produced no reading.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Browser process could not be started.
    #[error("[{source_id}] browser launch failed: {detail}")]
    LaunchFailed { source_id: String, detail: String },

    /// A bounded wait (navigation or structural marker) elapsed.
    #[error("[{source_id}] timed out waiting for {waiting_for} after {timeout_secs}s")]
    Timeout {
        source_id: String,
        waiting_for: String,
        timeout_secs: u64,
    },

    /// The page loaded but nothing matched any accepted label.
    #[error("[{source_id}] no match: {detail}")]
    NotFound { source_id: String, detail: String },

    /// The body, its data field or the series was absent or empty.
    #[error("[{source_id}] empty response: {detail}")]
    EmptyResponse { source_id: String, detail: String },

    /// Other page-level failure.
    #[error("[{source_id}] browser error: {source}")]
    Browser {
        source_id: String,
        #[source]
        source: BrowserError,
    },

    /// Transport, status or decoding failure on a REST call.
    #[error("[{source_id}] fetch failed: {source}")]
    Fetch {
        source_id: String,
        #[source]
        source: FetchError,
    },
}

impl ExtractError {
    /// Attributes a browser failure to a source, folding bounded waits into `Timeout`.
    pub fn from_browser(source_id: &str, error: BrowserError) -> Self {
        let source_id = source_id.to_string();
        match error {
            BrowserError::LaunchFailed(detail) => ExtractError::LaunchFailed { source_id, detail },
            BrowserError::NavigationTimeout { url, timeout_secs } => ExtractError::Timeout {
                source_id,
                waiting_for: format!("navigation to {url}"),
                timeout_secs,
            },
            BrowserError::MarkerTimeout {
                selector, timeout_secs, ..
            } => ExtractError::Timeout {
                source_id,
                waiting_for: format!("marker `{selector}`"),
                timeout_secs,
            },
            other => ExtractError::Browser { source_id, source: other },
        }
    }

    /// Attributes a fetch failure to a source. An empty 2xx body is `EmptyResponse`.
    pub fn from_fetch(source_id: &str, error: FetchError) -> Self {
        let source_id = source_id.to_string();
        match error {
            FetchError::EmptyBody { url } => ExtractError::EmptyResponse {
                source_id,
                detail: format!("empty body from {url}"),
            },
            other => ExtractError::Fetch { source_id, source: other },
        }
    }

    pub fn empty(source_id: &str, detail: impl Into<String>) -> Self {
        ExtractError::EmptyResponse {
            source_id: source_id.to_string(),
            detail: detail.into(),
        }
    }
}

/// One price source, one extraction strategy.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable identifier used in logs, readings and reports.
    fn id(&self) -> &str;

    /// Performs one extraction. Implementations must bound every wait.
    async fn extract(&self) -> Result<RawReading, ExtractError>;
}
