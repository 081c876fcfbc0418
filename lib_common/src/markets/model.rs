//! # Price Model
//!
//! The value types that travel through the pipeline. Adapters produce
//! `RawReading`s, the normalizer turns them into `CanonicalPrice`s and the
//! conversion stage consumes an `ExchangeRate`. `CellTarget` is the static
//! address each value is published to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// The unparsed value an adapter captured.
///
/// Rendered pages yield locale-formatted text ("83.500"), REST endpoints
/// yield either JSON numbers or decimal strings ("65000.5").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Text exactly as it appeared upstream, trimmed.
    Text(String),
    /// A JSON number, kept at full decimal precision.
    Number(Decimal),
}

impl RawValue {
    /// Lifts a JSON scalar into a `RawValue`.
    ///
    /// Returns `None` for `null`, booleans, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(RawValue::Text(text.trim().to_string())),
            Value::Number(number) => decimal_from_json_number(number).map(RawValue::Number),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(text) => write!(f, "{text}"),
            RawValue::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(text: &str) -> Self {
        RawValue::Text(text.to_string())
    }
}

impl From<Decimal> for RawValue {
    fn from(number: Decimal) -> Self {
        RawValue::Number(number)
    }
}

fn decimal_from_json_number(number: &Number) -> Option<Decimal> {
    let repr = number.to_string();
    Decimal::from_str(&repr)
        .ok()
        .or_else(|| Decimal::from_scientific(&repr).ok())
}

/// One reading produced by one adapter call. Consumed once by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Identifier of the producing source (e.g. `btc`).
    pub source_id: String,
    /// The captured value.
    pub raw_value: RawValue,
    /// When the adapter captured the value.
    pub captured_at: DateTime<Utc>,
}

impl RawReading {
    /// Stamps a new reading with the current time.
    pub fn now(source_id: impl Into<String>, raw_value: RawValue) -> Self {
        Self {
            source_id: source_id.into(),
            raw_value,
            captured_at: Utc::now(),
        }
    }
}

/// Currency a canonical amount is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Vietnamese dong, whole units.
    Vnd,
    /// Tether; only ever an intermediate before conversion to VND.
    Usdt,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Vnd => write!(f, "VND"),
            Currency::Usdt => write!(f, "USDT"),
        }
    }
}

/// A normalized, unit-consistent price. `amount` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPrice {
    pub source_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub captured_at: DateTime<Utc>,
}

/// Stablecoin to local currency rate. Lives for a single job run only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: Currency,
    pub quote: Currency,
    pub rate: Decimal,
    pub captured_at: DateTime<Utc>,
}

/// The sheet and A1-style cell a source publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellTarget {
    pub sheet_name: String,
    pub cell_address: String,
}

impl CellTarget {
    pub fn new(sheet_name: impl Into<String>, cell_address: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            cell_address: cell_address.into(),
        }
    }
}

impl fmt::Display for CellTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet_name, self.cell_address)
    }
}
