//! # Price Sources
//!
//! Everything that knows about a concrete upstream lives here: the shared
//! reading/price model, one adapter per upstream family and the catalogue that
//! wires adapters to their cells and job groups.
//!
//! ## Contained Modules:
//! - **`model`**: `RawReading`, `CanonicalPrice`, `ExchangeRate`, `CellTarget`.
//! - **`gold`**: rendered-page adapter for the retail gold price table.
//! - **`etf`**: OHLC time-series adapter (last close of a trailing window).
//! - **`crypto`**: spot ticker and simple-price (exchange rate) adapters.
//! - **`catalog`**: the static job/cell mapping used by the daemon.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Source-agnostic reading and price types.
pub mod model;

/// Retail gold price scraped from a rendered page.
#[cfg(feature = "browser")]
pub mod gold;

/// ETF price from an OHLC time-series endpoint.
pub mod etf;

/// Crypto spot prices and the USDT/VND exchange rate.
pub mod crypto;

/// Static job definitions and cell mapping.
pub mod catalog;
