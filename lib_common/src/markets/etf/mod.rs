//! ETF price from a daily OHLC chart endpoint.

pub mod ohlc;

pub use ohlc::{OhlcConfig, OhlcSeriesSource};
