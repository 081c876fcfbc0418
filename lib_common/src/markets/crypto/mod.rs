//! Crypto spot prices (quoted in USDT) and the USDT/VND rate they are
//! converted with.

pub mod simple_price;
pub mod ticker;

pub use simple_price::{SimplePriceConfig, SimplePriceSource};
pub use ticker::{SpotTickerSource, TickerConfig};
