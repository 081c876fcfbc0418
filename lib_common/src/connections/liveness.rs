//! # Liveness Probe
//!
//! One outbound GET to an external health-check URL per tick. Any non-empty
//! body counts as healthy. Failures are logged and otherwise ignored.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::retrieve::{FetchError, HttpFetcher};

pub struct LivenessProbe {
    url: String,
    fetcher: Arc<dyn HttpFetcher>,
}

impl LivenessProbe {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            url: url.into(),
            fetcher,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pings once. The result is already logged; callers may drop it.
    pub async fn ping(&self) -> Result<(), FetchError> {
        let started = Instant::now();
        let result = match self.fetcher.get_text(&self.url).await {
            Ok(body) if body.trim().is_empty() => Err(FetchError::EmptyBody { url: self.url.clone() }),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => info!(url = %self.url, elapsed_ms, "liveness ping ok"),
            Err(e) => warn!(url = %self.url, elapsed_ms, error = %e, "liveness ping failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Body(&'static str);

    #[async_trait]
    impl HttpFetcher for Body {
        async fn get_json(&self, _url: &str, _query: &[(&str, String)]) -> Result<Value, FetchError> {
            Ok(Value::Null)
        }

        async fn get_text(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn any_body_is_healthy() {
        let probe = LivenessProbe::new("https://hc.example.test/ping", Arc::new(Body("OK")));
        assert!(probe.ping().await.is_ok());
    }

    #[tokio::test]
    async fn blank_body_is_unhealthy() {
        let probe = LivenessProbe::new("https://hc.example.test/ping", Arc::new(Body("  \n")));
        assert!(matches!(probe.ping().await, Err(FetchError::EmptyBody { .. })));
    }
}
