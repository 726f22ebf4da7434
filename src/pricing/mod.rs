//! Local-currency to settlement-currency conversion.
//!
//! Amounts in the settlement currency are kept as integer minor units
//! (cents). Conversion goes through `BigDecimal` so that `price / rate`
//! is rounded once, half away from zero, at the cent.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use crate::core::error::QuoteError;

/// Settlement-currency amount in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Value for writers that need a float (spreadsheet number cells).
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Two-decimal amount without currency symbol, e.g. `1234.50`.
    pub fn plain(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plain = self.plain();
        match plain.strip_prefix('-') {
            Some(abs) => write!(f, "-${abs}"),
            None => write!(f, "${plain}"),
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Local-currency units per settlement-currency unit. Always positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRate {
    raw: f64,
    value: BigDecimal,
}

impl ExchangeRate {
    pub fn new(rate: f64) -> Result<Self, QuoteError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(QuoteError::MissingExchangeRate);
        }
        let value = decimal_from_f64(rate).ok_or(QuoteError::MissingExchangeRate)?;
        Ok(Self { raw: rate, value })
    }

    pub fn from_option(rate: Option<f64>) -> Result<Self, QuoteError> {
        rate.map_or(Err(QuoteError::MissingExchangeRate), Self::new)
    }

    pub fn value(&self) -> f64 {
        self.raw
    }
}

/// Unit and extended price of one line, in the settlement currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinePrice {
    pub unit: Money,
    pub extended: Money,
}

/// `amount / rate` for a local-currency amount. Rejects a missing or
/// non-positive rate instead of producing an infinite value.
pub fn convert(amount_local: f64, rate: f64) -> Result<f64, QuoteError> {
    let rate = ExchangeRate::new(rate)?;
    Ok(amount_local / rate.value())
}

/// The local price a line is billed at: its override when present,
/// otherwise the catalog price, otherwise zero.
pub fn effective_local_price(catalog_price: Option<f64>, override_price: Option<f64>) -> f64 {
    override_price
        .filter(|price| price.is_finite())
        .or(catalog_price.filter(|price| price.is_finite()))
        .unwrap_or(0.0)
}

pub fn price_line(local_price: f64, quantity: i64, rate: &ExchangeRate) -> LinePrice {
    let Some(price) = decimal_from_f64(local_price) else {
        return LinePrice {
            unit: Money::ZERO,
            extended: Money::ZERO,
        };
    };

    let unit = &price / &rate.value;
    let extended = &unit * BigDecimal::from(quantity);

    LinePrice {
        unit: to_money(&unit),
        extended: to_money(&extended),
    }
}

fn to_money(value: &BigDecimal) -> Money {
    let cents = (value * BigDecimal::from(100)).with_scale_round(0, RoundingMode::HalfUp);
    Money(cents.to_i64().unwrap_or(0))
}

/// Exact decimal from the shortest representation of a float, so that a
/// stored `40000` or `0.1` converts to exactly that decimal.
fn decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&value.to_string()).ok()
}

/// Rounds a float to two decimals (weights, dimensions).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario_rate_4000() {
        let rate = ExchangeRate::new(4000.0).unwrap();
        let price = price_line(40000.0, 10, &rate);
        assert_eq!(price.unit.to_string(), "$10.00");
        assert_eq!(price.extended.to_string(), "$100.00");
    }

    #[test]
    fn test_extended_is_rounded_after_multiplying() {
        let rate = ExchangeRate::new(3900.0).unwrap();
        // 10000 / 3900 = 2.5641..., x 3 = 7.6923...
        let price = price_line(10000.0, 3, &rate);
        assert_eq!(price.unit, Money::from_cents(256));
        assert_eq!(price.extended, Money::from_cents(769));
    }

    #[test]
    fn test_extended_matches_formula_for_many_inputs() {
        for (local, rate, qty) in [
            (40000.0, 4000.0, 10),
            (12345.0, 4187.5, 7),
            (999.99, 3.3, 1),
            (1.0, 3000.0, 250),
        ] {
            let expected = ((local / rate * qty as f64) * 100.0).round() as i64;
            let price = price_line(local, qty, &ExchangeRate::new(rate).unwrap());
            assert_eq!(price.extended.cents(), expected, "{local} / {rate} * {qty}");
        }
    }

    #[test]
    fn test_half_cent_rounds_away_from_zero() {
        let rate = ExchangeRate::new(1.0).unwrap();
        assert_eq!(price_line(0.005, 1, &rate).unit, Money::from_cents(1));
        assert_eq!(price_line(0.125, 1, &rate).unit, Money::from_cents(13));
    }

    #[test]
    fn test_invalid_rates_are_rejected() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                ExchangeRate::new(rate),
                Err(QuoteError::MissingExchangeRate)
            ));
        }
        assert!(matches!(
            ExchangeRate::from_option(None),
            Err(QuoteError::MissingExchangeRate)
        ));
        assert!(convert(100.0, 0.0).is_err());
        assert_eq!(convert(100.0, 4.0).unwrap(), 25.0);
    }

    #[test]
    fn test_override_wins_over_catalog_price() {
        assert_eq!(effective_local_price(Some(100.0), Some(80.0)), 80.0);
        assert_eq!(effective_local_price(Some(100.0), None), 100.0);
        assert_eq!(effective_local_price(None, None), 0.0);
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(Money::from_cents(123456).to_string(), "$1234.56");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-250).to_string(), "-$2.50");
        let total: Money = [Money::from_cents(150), Money::from_cents(50)].into_iter().sum();
        assert_eq!(total.plain(), "2.00");
    }
}
