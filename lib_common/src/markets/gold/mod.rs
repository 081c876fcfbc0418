//! Retail gold price, read from a browser-rendered price board.

pub mod retail_page;
pub mod table_scan;

pub use retail_page::{RetailGoldSource, RetailPageConfig};
