//! # Browser Rendering
//!
//! Some price pages are rendered client-side and only expose their tables to
//! a real browser. This module owns the headless Chrome process(es) and hands
//! out pages under a scoped-acquisition contract: every page that is acquired
//! is released on every exit path.
//!
//! ## Contained Modules:
//! - **`session`**: `BrowserManager`, the only owner of browser processes.
//!
//! Adapters never talk to the manager directly; they go through the
//! `PageRenderer` trait, which renders a URL once a structural marker is
//! present and returns the document HTML.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Browser process and page management.
#[cfg(feature = "browser")]
pub mod session;

#[cfg(feature = "browser")]
pub use session::{BrowserManager, BrowserMode, BrowserOptions, PageLease};

/// Failures of the browser layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be spawned or connected to.
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    /// A page-level operation failed (new tab, navigation, content read).
    #[error("page operation on {url} failed: {detail}")]
    Page { url: String, detail: String },

    /// Navigation did not settle within its bound.
    #[error("navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    /// The structural marker never appeared.
    #[error("marker `{selector}` not present on {url} after {timeout_secs}s")]
    MarkerTimeout {
        url: String,
        selector: String,
        timeout_secs: u64,
    },
}

/// What to render and how long each phase may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,
    /// CSS selector that must match before the page is considered loaded.
    pub marker: String,
    pub navigation_timeout: Duration,
    pub marker_timeout: Duration,
}

/// Renders a page in a real browser and returns its HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<String, BrowserError>;
}
