//! # Data Retrieval Module
//!
//! Generic HTTP retrieval used by every REST-based price source and by the
//! liveness probe. Source adapters depend on the `HttpFetcher` trait only, so
//! they can be exercised against canned JSON in tests.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: `ApiClient`, a `reqwest` + `reqwest-middleware` client with
//!   a fixed request timeout, browser-like default headers, optional bearer
//!   authentication and opt-in transient retries.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client and the `HttpFetcher` seam.
pub mod ky_http;

pub use ky_http::{ApiClient, ApiResponse, FetchError, HttpFetcher, HttpOptions};
