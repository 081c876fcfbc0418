//! # Currency Conversion
//!
//! Turns stablecoin-denominated prices into local currency using the rate
//! fetched earlier in the same job run. A missing rate is an error for the
//! dependent source only; the rest of the job is unaffected.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::markets::model::{CanonicalPrice, Currency, ExchangeRate};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    /// The job's rate source failed or was never configured.
    #[error("[{source_id}] no {base}->{quote} exchange rate available")]
    MissingRate {
        source_id: String,
        base: Currency,
        quote: Currency,
    },

    #[error("[{source_id}] price in {actual} cannot use a {expected} rate")]
    CurrencyMismatch {
        source_id: String,
        expected: Currency,
        actual: Currency,
    },

    #[error("[{source_id}] conversion overflowed")]
    Overflow { source_id: String },

    #[error("[{source_id}] rate must be positive, got {rate}")]
    InvalidRate { source_id: String, rate: Decimal },
}

impl ExchangeRate {
    /// Builds the run's rate from the normalized rate-source price.
    ///
    /// The price's currency is the quote currency (the rate source reports how
    /// much local currency one `base` unit costs).
    pub fn from_price(price: &CanonicalPrice, base: Currency) -> Result<Self, ConversionError> {
        if price.amount <= Decimal::ZERO {
            return Err(ConversionError::InvalidRate {
                source_id: price.source_id.clone(),
                rate: price.amount,
            });
        }
        Ok(Self {
            base,
            quote: price.currency,
            rate: price.amount,
            captured_at: price.captured_at,
        })
    }
}

/// Converts `price` into the rate's quote currency.
///
/// `rate` is `None` when the job's rate source did not produce a value; that
/// is reported as `MissingRate` rather than publishing an unconverted amount.
pub fn convert(price: &CanonicalPrice, rate: Option<&ExchangeRate>) -> Result<CanonicalPrice, ConversionError> {
    let rate = rate.ok_or_else(|| ConversionError::MissingRate {
        source_id: price.source_id.clone(),
        base: price.currency,
        quote: Currency::Vnd,
    })?;

    if price.currency != rate.base {
        return Err(ConversionError::CurrencyMismatch {
            source_id: price.source_id.clone(),
            expected: rate.base,
            actual: price.currency,
        });
    }

    let amount = price
        .amount
        .checked_mul(rate.rate)
        .ok_or_else(|| ConversionError::Overflow {
            source_id: price.source_id.clone(),
        })?;

    Ok(CanonicalPrice {
        source_id: price.source_id.clone(),
        amount: amount.normalize(),
        currency: rate.quote,
        captured_at: price.captured_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn price(id: &str, amount: &str, currency: Currency) -> CanonicalPrice {
        CanonicalPrice {
            source_id: id.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            currency,
            captured_at: Utc::now(),
        }
    }

    fn usdt_rate(rate: &str) -> ExchangeRate {
        ExchangeRate::from_price(&price("usdt_vnd", rate, Currency::Vnd), Currency::Usdt).unwrap()
    }

    #[test]
    fn multiplies_by_the_rate() {
        let rate = usdt_rate("25500");
        let converted = convert(&price("btc", "65000.5", Currency::Usdt), Some(&rate)).unwrap();
        assert_eq!(converted.amount, Decimal::from(1_657_512_750u64));
        assert_eq!(converted.currency, Currency::Vnd);
        assert_eq!(converted.source_id, "btc");
    }

    #[test]
    fn missing_rate_is_reported_not_guessed() {
        let err = convert(&price("eth", "3000", Currency::Usdt), None).unwrap_err();
        assert_eq!(
            err,
            ConversionError::MissingRate {
                source_id: "eth".to_string(),
                base: Currency::Usdt,
                quote: Currency::Vnd,
            }
        );
    }

    #[test]
    fn mismatched_currency_is_rejected() {
        let rate = usdt_rate("25500");
        let err = convert(&price("gold", "83500000", Currency::Vnd), Some(&rate)).unwrap_err();
        assert!(matches!(err, ConversionError::CurrencyMismatch { .. }));
    }

    #[test]
    fn zero_rate_is_invalid() {
        let err = ExchangeRate::from_price(&price("usdt_vnd", "0", Currency::Vnd), Currency::Usdt).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRate { .. }));
    }

    #[test]
    fn overflow_is_an_error() {
        let rate = usdt_rate("25500");
        let huge = CanonicalPrice {
            amount: Decimal::MAX,
            ..price("btc", "1", Currency::Usdt)
        };
        let err = convert(&huge, Some(&rate)).unwrap_err();
        assert!(matches!(err, ConversionError::Overflow { .. }));
    }
}
