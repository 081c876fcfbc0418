//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`
//! and `reqwest-middleware`, plus the `HttpFetcher` trait the price adapters
//! are written against.
//!
//! Every request is bounded by the configured timeout. Transient retries are
//! off unless `HttpOptions::max_retries` is raised: the pipeline treats the next
//! scheduled trigger as its retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Errors raised while talking to an HTTP endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {detail}")]
    InvalidUrl { url: String, detail: String },

    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    #[error("{url} answered with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("undecodable body from {url}: {detail}")]
    Decode { url: String, detail: String },

    #[error("empty body from {url}")]
    EmptyBody { url: String },
}

/// Transport knobs shared by every client built from configuration.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Upper bound for one request, connect to last byte.
    pub timeout: Duration,
    /// Transient-failure retries; `0` disables the retry middleware.
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with metadata about the HTTP
/// transaction, such as status code and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body; `None` when the server sent no content.
    pub data: Option<T>,
    /// The raw body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Whether the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// The fetch capability source adapters depend on.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GETs `url` with the given query pairs and decodes the body as JSON.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError>;

    /// GETs `url` and returns the body as text, whatever its content type.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`; it handles an optional base URL,
/// bearer authentication and opt-in retries.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// Base URL relative paths are joined to. Absolute URLs bypass it.
    base_url: Option<Url>,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - Optional absolute base URL (e.g. "https://sheets.googleapis.com/").
    /// * `auth_token` - Optional bearer token sent with every request.
    /// * `options` - Timeout, retry and user agent settings.
    ///
    /// # Errors
    /// `FetchError::InvalidUrl` for a malformed base URL and
    /// `FetchError::Client` if the TLS backend cannot be initialised.
    pub fn new(
        base_url: Option<&str>,
        auth_token: Option<String>,
        options: &HttpOptions,
    ) -> Result<Self, FetchError> {
        let base_url = base_url
            .map(|raw| {
                Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
                    url: raw.to_string(),
                    detail: e.to_string(),
                })
            })
            .transpose()?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .default_headers(default_headers())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let mut builder = ClientBuilder::new(client);
        if options.max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            base_url,
            auth_token,
        })
    }

    /// Resolves `path` against the base URL. Absolute URLs are returned as-is.
    pub fn resolve(&self, path: &str) -> Result<Url, FetchError> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        let invalid = |detail: String| FetchError::InvalidUrl {
            url: path.to_string(),
            detail,
        };
        match &self.base_url {
            Some(base) => base.join(path).map_err(|e| invalid(e.to_string())),
            None => Err(invalid("relative path without a base url".to_string())),
        }
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone().ok_or_else(|| FetchError::InvalidUrl {
            url: segments.join("/"),
            detail: "no base url configured".to_string(),
        })?;
        {
            let mut path = url.path_segments_mut().map_err(|_| FetchError::InvalidUrl {
                url: segments.join("/"),
                detail: "base url cannot carry a path".to_string(),
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Performs a request and decodes a JSON body on success.
    ///
    /// Non-2xx answers are not errors here: they come back with
    /// `success == false` and the raw body in `error_body`.
    ///
    /// # Errors
    /// `FetchError::Transport` when the request cannot be completed and
    /// `FetchError::Decode` when a 2xx body is not valid JSON for `T`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, FetchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url_text = url.to_string();
        let mut req = self.inner.request(method, url);

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(h) = headers {
            req = req.headers(h);
        }
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(b) = body {
            let json_body = serde_json::to_string(b).map_err(|e| FetchError::Decode {
                url: url_text.clone(),
                detail: e.to_string(),
            })?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await.map_err(|e| FetchError::Transport {
            url: url_text.clone(),
            detail: e.to_string(),
        })?;
        let status = response.status();
        let resp_headers = response.headers().clone();
        let text = response.text().await.map_err(|e| FetchError::Transport {
            url: url_text.clone(),
            detail: e.to_string(),
        })?;
        debug!(url = %url_text, status = status.as_u16(), bytes = text.len(), "http response");

        if !status.is_success() {
            return Ok(ApiResponse {
                data: None,
                error_body: Some(text),
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            });
        }

        let data = if text.trim().is_empty() {
            None
        } else {
            let decoded = serde_json::from_str::<T>(&text).map_err(|e| FetchError::Decode {
                url: url_text.clone(),
                detail: e.to_string(),
            })?;
            Some(decoded)
        };

        Ok(ApiResponse {
            data,
            error_body: None,
            status: status.as_u16(),
            success: true,
            headers: resp_headers,
        })
    }
}

#[async_trait]
impl HttpFetcher for ApiClient {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let resolved = self.resolve(url)?;
        let url_text = resolved.to_string();
        let response = self
            .request::<Value, ()>(Method::GET, resolved, query, None, None)
            .await?;

        if !response.success {
            return Err(FetchError::Status {
                url: url_text,
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }
        response.data.ok_or(FetchError::EmptyBody { url: url_text })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resolved = self.resolve(url)?;
        let url_text = resolved.to_string();
        let response = self
            .inner
            .get(resolved)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url_text.clone(),
                detail: e.to_string(),
            })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| FetchError::Transport {
            url: url_text.clone(),
            detail: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_text,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// Browser-mimic headers; some price endpoints refuse bare clients.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    let header_list = [
        ("accept", "application/json, text/plain, */*"),
        ("accept-language", "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
        ("cache-control", "no-cache"),
        ("pragma", "no-cache"),
    ];

    for (name, value) in header_list {
        if let (Ok(h_name), Ok(h_value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(h_name, h_value);
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: Option<&str>) -> ApiClient {
        ApiClient::new(base, None, &HttpOptions::default()).unwrap()
    }

    #[test]
    fn absolute_urls_bypass_the_base() {
        let api = client(Some("https://sheets.googleapis.com/"));
        let url = api.resolve("https://api.binance.com/api/v3/ticker/price").unwrap();
        assert_eq!(url.host_str(), Some("api.binance.com"));
    }

    #[test]
    fn relative_paths_need_a_base() {
        let api = client(None);
        assert!(matches!(api.resolve("api/v3/ticker/price"), Err(FetchError::InvalidUrl { .. })));

        let api = client(Some("https://api.binance.com/"));
        let url = api.resolve("api/v3/ticker/price").unwrap();
        assert_eq!(url.as_str(), "https://api.binance.com/api/v3/ticker/price");
    }

    #[test]
    fn endpoint_segments_are_percent_encoded() {
        let api = client(Some("https://sheets.googleapis.com/"));
        let url = api
            .endpoint(&["v4", "spreadsheets", "sheet-1", "values", "Gold Prices!B2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Gold%20Prices!B2"
        );
    }

    #[tokio::test]
    async fn plain_text_bodies_are_returned_verbatim() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            let response = "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 5\r\nconnection: close\r\n\r\npong\n";
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let body = client(None).get_text(&format!("http://{addr}/ping")).await.unwrap();
        assert_eq!(body, "pong\n");
    }

    #[test]
    fn malformed_base_is_rejected() {
        let result = ApiClient::new(Some("not a url"), None, &HttpOptions::default());
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn retries_are_off_by_default() {
        let options = HttpOptions::default();
        assert_eq!(options.max_retries, 0);
        assert_eq!(options.timeout, Duration::from_secs(30));
    }
}
