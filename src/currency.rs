//! Currency Converter
//!
//! Pure fixed-rate conversion between the mobile-money network's localized
//! currency and the canonical storage currency. The rate is configuration,
//! fixed per deployment; amounts are rounded half-up to minor units (2 dp).

use bigdecimal::{BigDecimal, RoundingMode};

/// Conversion errors
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Unsupported currency: {currency} (expected {canonical} or {localized})")]
    UnsupportedCurrency {
        currency: String,
        canonical: String,
        localized: String,
    },

    #[error("Invalid conversion rate: {0}")]
    InvalidRate(String),
}

/// Fixed-rate converter between one localized and one canonical currency.
///
/// `rate` is the number of localized units per one canonical unit.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    canonical: String,
    localized: String,
    rate: BigDecimal,
}

impl CurrencyConverter {
    pub fn new(
        canonical: impl Into<String>,
        localized: impl Into<String>,
        rate: BigDecimal,
    ) -> Result<Self, ConversionError> {
        if rate <= BigDecimal::from(0) {
            return Err(ConversionError::InvalidRate(rate.to_string()));
        }

        Ok(Self {
            canonical: canonical.into().to_uppercase(),
            localized: localized.into().to_uppercase(),
            rate,
        })
    }

    pub fn canonical_currency(&self) -> &str {
        &self.canonical
    }

    pub fn localized_currency(&self) -> &str {
        &self.localized
    }

    /// Convert an amount reported in `currency` into the canonical currency.
    ///
    /// Amounts already denominated in the canonical currency pass through
    /// unchanged apart from minor-unit normalization.
    pub fn to_canonical(
        &self,
        amount: &BigDecimal,
        currency: &str,
    ) -> Result<BigDecimal, ConversionError> {
        let currency = currency.trim().to_uppercase();
        if currency == self.canonical {
            return Ok(round_minor(amount));
        }
        if currency == self.localized {
            return Ok(round_minor(&(amount / &self.rate)));
        }

        Err(ConversionError::UnsupportedCurrency {
            currency,
            canonical: self.canonical.clone(),
            localized: self.localized.clone(),
        })
    }

    /// Convert a canonical amount into the localized currency.
    pub fn to_localized(&self, amount: &BigDecimal) -> BigDecimal {
        round_minor(&(amount * &self.rate))
    }
}

fn round_minor(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new("USD", "KES", BigDecimal::from(150))
            .expect("converter should build")
    }

    #[test]
    fn localized_amount_converts_to_canonical() {
        let converted = converter()
            .to_canonical(&BigDecimal::from(300_000), "KES")
            .expect("conversion should succeed");
        assert_eq!(converted, BigDecimal::from_str("2000.00").unwrap());
    }

    #[test]
    fn canonical_amount_passes_through() {
        let converted = converter()
            .to_canonical(&BigDecimal::from_str("1000").unwrap(), "usd")
            .expect("conversion should succeed");
        assert_eq!(converted, BigDecimal::from_str("1000.00").unwrap());
    }

    #[test]
    fn conversion_rounds_half_up_to_minor_units() {
        // 100 / 150 = 0.666... -> 0.67
        let converted = converter()
            .to_canonical(&BigDecimal::from(100), "KES")
            .expect("conversion should succeed");
        assert_eq!(converted, BigDecimal::from_str("0.67").unwrap());
    }

    #[test]
    fn round_trip_stays_within_one_minor_unit() {
        let converter = converter();
        let canonical = BigDecimal::from_str("1000.00").unwrap();
        let localized = converter.to_localized(&canonical);
        let back = converter
            .to_canonical(&localized, "KES")
            .expect("conversion should succeed");
        let diff = (&back - &canonical).abs();
        assert!(diff <= BigDecimal::from_str("0.01").unwrap());
    }

    #[test]
    fn unsupported_currency_is_rejected() {
        let result = converter().to_canonical(&BigDecimal::from(10), "EUR");
        assert!(matches!(
            result,
            Err(ConversionError::UnsupportedCurrency { .. })
        ));
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        assert!(CurrencyConverter::new("USD", "KES", BigDecimal::from(0)).is_err());
        assert!(CurrencyConverter::new("USD", "KES", BigDecimal::from(-5)).is_err());
    }
}
