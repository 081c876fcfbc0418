//! # Spreadsheet Sink
//!
//! Publishes values to fixed cells of a Google spreadsheet through the Sheets
//! v4 `values.update` call. Each write replaces the cell content, so writing
//! the same value twice leaves the sheet unchanged.
//!
//! Values are sent as `USER_ENTERED` strings: the sheet applies its own
//! locale parsing, which is why amounts are pre-formatted with
//! [`format_for_sheet`] using the separator the sheet's locale expects.

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::retrieve::{ApiClient, FetchError, HttpOptions};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";

#[derive(Debug, Error)]
pub enum SinkError {
    /// Address is not a single A1-style cell such as `B5`.
    #[error("invalid cell address `{0}`")]
    InvalidCell(String),

    #[error("sheet rejected write to {range} with status {status}: {body}")]
    Rejected { range: String, status: u16, body: String },

    #[error("sheet write failed: {0}")]
    Transport(#[from] FetchError),
}

/// The single capability the pipeline needs from its sink.
#[async_trait]
pub trait CellSink: Send + Sync {
    /// Overwrites one cell with a user-entered string.
    async fn set_cell(&self, sheet_name: &str, cell_address: &str, value: &str) -> Result<(), SinkError>;
}

/// Accepts `[A-Z]+[1-9][0-9]*`.
pub fn is_a1_cell(address: &str) -> bool {
    let letters = address.chars().take_while(|c| c.is_ascii_uppercase()).count();
    let digits = &address[letters..];
    letters > 0
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

/// Renders an amount for a `USER_ENTERED` write: no grouping, at most two
/// fractional digits, trailing zeros dropped.
pub fn format_for_sheet(amount: Decimal, decimal_separator: char) -> String {
    let text = amount.round_dp(2).normalize().to_string();
    if decimal_separator == '.' {
        text
    } else {
        text.replace('.', &decimal_separator.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [[&'a str; 1]; 1],
}

/// Sheets v4 client bound to one spreadsheet.
pub struct SheetsClient {
    api: ApiClient,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, token: Option<String>, options: &HttpOptions) -> Result<Self, SinkError> {
        Self::with_base(SHEETS_API_BASE, spreadsheet_id, token, options)
    }

    /// Same as [`new`](Self::new) against a different API root.
    pub fn with_base(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        token: Option<String>,
        options: &HttpOptions,
    ) -> Result<Self, SinkError> {
        Ok(Self {
            api: ApiClient::new(Some(base_url), token, options)?,
            spreadsheet_id: spreadsheet_id.into(),
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }
}

#[async_trait]
impl CellSink for SheetsClient {
    async fn set_cell(&self, sheet_name: &str, cell_address: &str, value: &str) -> Result<(), SinkError> {
        if !is_a1_cell(cell_address) {
            return Err(SinkError::InvalidCell(cell_address.to_string()));
        }

        let range = format!("{sheet_name}!{cell_address}");
        let url = self
            .api
            .endpoint(&["v4", "spreadsheets", &self.spreadsheet_id, "values", &range])?;
        let body = ValueRange {
            range: &range,
            major_dimension: "ROWS",
            values: [[value]],
        };
        let query = [("valueInputOption", "USER_ENTERED".to_string())];

        let response = self
            .api
            .request::<Value, _>(Method::PUT, url, &query, None, Some(&body))
            .await?;
        if !response.success {
            return Err(SinkError::Rejected {
                range,
                status: response.status,
                body: response.error_body.unwrap_or_default(),
            });
        }

        debug!(range = %range, value, "cell updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn a1_addresses() {
        for ok in ["B2", "AA10", "Z999"] {
            assert!(is_a1_cell(ok), "{ok}");
        }
        for bad in ["", "B", "2", "b2", "B0", "B02", "B2:B3", "Prices!B2", "B2 "] {
            assert!(!is_a1_cell(bad), "{bad}");
        }
    }

    #[test]
    fn formatting_has_no_grouping_and_two_decimals_at_most() {
        let amount = Decimal::from_str("1657512750.000").unwrap();
        assert_eq!(format_for_sheet(amount, '.'), "1657512750");

        let amount = Decimal::from_str("25500.456").unwrap();
        assert_eq!(format_for_sheet(amount, '.'), "25500.46");
        assert_eq!(format_for_sheet(amount, ','), "25500,46");

        let amount = Decimal::from_str("12.50").unwrap();
        assert_eq!(format_for_sheet(amount, ','), "12,5");
    }

    #[test]
    fn value_range_body_shape() {
        let body = ValueRange {
            range: "Prices!B5",
            major_dimension: "ROWS",
            values: [["1657512750"]],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "range": "Prices!B5",
                "majorDimension": "ROWS",
                "values": [["1657512750"]]
            })
        );
    }

    #[tokio::test]
    async fn invalid_cells_fail_before_any_request() {
        let client = SheetsClient::with_base("http://127.0.0.1:9/", "sheet-id", None, &HttpOptions::default()).unwrap();
        let err = client.set_cell("Prices", "B0", "1").await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidCell(_)));
    }
}
