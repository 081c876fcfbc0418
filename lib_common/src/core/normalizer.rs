//! # Normalizer
//!
//! Pure transform from `RawReading` to `CanonicalPrice`. Each source carries a
//! `NormalizeProfile` saying how its text is formatted, whether the
//! unit-correction heuristic applies and which currency the result is in.
//!
//! ## Rules, in order:
//! 1. Parse: localized text keeps digits only (every `.`/`,`/space grouping
//!    separator is dropped); plain text is parsed as a dot-decimal; JSON
//!    numbers are taken as-is.
//! 2. Reject negatives.
//! 3. Unit correction (only when configured): a value strictly below the
//!    threshold is multiplied by the factor. `36` becomes `36000`, `1000`
//!    stays `1000`.
//! 4. Fixed scale (e.g. a page that quotes in thousands).

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markets::model::{CanonicalPrice, Currency, RawReading, RawValue};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("[{source_id}] `{raw}` is not numeric")]
    NotNumeric { source_id: String, raw: String },

    #[error("[{source_id}] negative amount {amount}")]
    Negative { source_id: String, amount: Decimal },

    #[error("[{source_id}] amount overflows after scaling")]
    Overflow { source_id: String },
}

/// How a source formats numbers in text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberFormat {
    /// Grouped integers such as `83.500`, `36,000` or `1 250 000`.
    Localized,
    /// Machine decimals such as `65000.5`.
    Plain,
}

/// Rescales readings reported in the wrong magnitude.
///
/// A heuristic: the ETF feed sometimes quotes in thousands of VND (`36.05`)
/// and sometimes in VND (`36050`). It is enabled per source, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCorrection {
    /// Values strictly below this are considered shifted.
    pub threshold: Decimal,
    pub factor: Decimal,
}

impl UnitCorrection {
    /// Below 1000 means "quoted in thousands".
    pub fn thousands() -> Self {
        Self {
            threshold: Decimal::from(1000),
            factor: Decimal::from(1000),
        }
    }

    pub fn apply(&self, value: Decimal) -> Option<Decimal> {
        if value < self.threshold {
            value.checked_mul(self.factor)
        } else {
            Some(value)
        }
    }
}

/// Per-source normalization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeProfile {
    pub format: NumberFormat,
    pub unit_correction: Option<UnitCorrection>,
    /// Multiplier applied last; `1` for sources already in whole units.
    pub scale: Decimal,
    pub currency: Currency,
}

impl NormalizeProfile {
    pub fn plain(currency: Currency) -> Self {
        Self {
            format: NumberFormat::Plain,
            unit_correction: None,
            scale: Decimal::ONE,
            currency,
        }
    }

    pub fn localized(currency: Currency) -> Self {
        Self {
            format: NumberFormat::Localized,
            ..Self::plain(currency)
        }
    }

    pub fn with_unit_correction(mut self, correction: UnitCorrection) -> Self {
        self.unit_correction = Some(correction);
        self
    }

    pub fn with_scale(mut self, scale: Decimal) -> Self {
        self.scale = scale;
        self
    }
}

/// Drops every character that is not an ASCII digit.
pub fn strip_group_separators(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Converts one reading into a canonical price.
pub fn normalize(reading: &RawReading, profile: &NormalizeProfile) -> Result<CanonicalPrice, NormalizeError> {
    let source_id = reading.source_id.as_str();
    let parsed = parse_raw(source_id, &reading.raw_value, profile.format)?;

    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(NormalizeError::Negative {
            source_id: source_id.to_string(),
            amount: parsed,
        });
    }

    let overflow = || NormalizeError::Overflow {
        source_id: source_id.to_string(),
    };
    let corrected = match &profile.unit_correction {
        Some(correction) => correction.apply(parsed).ok_or_else(overflow)?,
        None => parsed,
    };
    let amount = corrected.checked_mul(profile.scale).ok_or_else(overflow)?;

    Ok(CanonicalPrice {
        source_id: reading.source_id.clone(),
        amount: amount.normalize(),
        currency: profile.currency,
        captured_at: reading.captured_at,
    })
}

fn parse_raw(source_id: &str, raw: &RawValue, format: NumberFormat) -> Result<Decimal, NormalizeError> {
    let not_numeric = || NormalizeError::NotNumeric {
        source_id: source_id.to_string(),
        raw: raw.to_string(),
    };

    match raw {
        RawValue::Number(number) => Ok(*number),
        RawValue::Text(text) => {
            let trimmed = text.trim();
            match format {
                NumberFormat::Localized => {
                    if trimmed.starts_with('-') {
                        let digits = strip_group_separators(trimmed);
                        let magnitude = Decimal::from_str(&digits).map_err(|_| not_numeric())?;
                        return Err(NormalizeError::Negative {
                            source_id: source_id.to_string(),
                            amount: -magnitude,
                        });
                    }
                    let digits = strip_group_separators(trimmed);
                    if digits.is_empty() {
                        return Err(not_numeric());
                    }
                    Decimal::from_str(&digits).map_err(|_| not_numeric())
                }
                NumberFormat::Plain => {
                    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
                    Decimal::from_str(&compact)
                        .or_else(|_| Decimal::from_scientific(&compact))
                        .map_err(|_| not_numeric())
                }
            }
        }
    }
}
