//! # lib_common
//!
//! Shared library behind the `price_sync` daemon. It collects asset prices from
//! heterogeneous sources (a rendered retail gold page, an ETF time series and a
//! set of crypto tickers), normalizes each reading into a canonical decimal,
//! converts stablecoin-quoted prices into VND and publishes every value to a
//! fixed spreadsheet cell.
//!
//! ## Module map:
//! - **`markets`**: data model, source adapters and the static source catalogue.
//! - **`ingestors`**: the `PriceSource` capability every adapter implements.
//! - **`browser`**: headless Chrome session manager and the `PageRenderer` seam.
//! - **`retrieve`**: HTTP fetcher built on `reqwest` + `reqwest-middleware`.
//! - **`core`**: normalizer, conversion stage, orchestrator and job reports.
//! - **`connections`**: spreadsheet sink and liveness probe.
//! - **`loggers`**: `tracing` subscriber setup (console + rolling JSON file).
//! - **`utils`**: process information helpers.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Headless browser session management and page rendering.
pub mod browser;
/// Spreadsheet sink and liveness probe.
pub mod connections;
/// Normalizer, conversion stage and ingestion orchestrator.
pub mod core;
/// The adapter capability shared by every price source.
pub mod ingestors;
/// Structured logging setup.
#[cfg(feature = "loggers")]
pub mod loggers;
/// Price model, source adapters and the source catalogue.
pub mod markets;
/// HTTP retrieval client.
pub mod retrieve;
/// General helpers.
pub mod utils;

pub use crate::core::orchestrator::{Job, Orchestrator, Pricing, RateBinding, SourceBinding};
pub use crate::core::report::{ErrorKind, JobReport, Outcome, PipelineError, SourceOutcome};
pub use crate::markets::model::{CanonicalPrice, CellTarget, Currency, ExchangeRate, RawReading, RawValue};
