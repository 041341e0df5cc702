//! Decimal money helpers.
//!
//! Amounts are stored as `NUMERIC(12, 2)` in rupees and carried as
//! [`Decimal`]. The payment gateway works in the smallest currency unit
//! (paise), so conversions go through [`Money::to_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount, rounded to two decimal places.
    #[must_use]
    pub fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount: round_amount(amount),
            currency_code,
        }
    }

    /// Create an INR amount.
    #[must_use]
    pub fn inr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::INR)
    }

    /// Amount in the smallest currency unit (e.g. paise).
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64()
    }

    /// Build an amount from the smallest currency unit.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency_code,
        }
    }

    /// Format for display in emails and logs (e.g. "₹1,299.00").
    #[must_use]
    pub fn display(&self) -> String {
        let rounded = round_amount(self.amount);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = format!("{:.2}", rounded.abs());
        let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!(
            "{}{}{grouped}.{frac}",
            if negative { "-" } else { "" },
            self.currency_code.symbol()
        )
    }
}

/// Round a money amount to two decimal places, midpoint away from zero.
#[must_use]
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// Currency symbol used when formatting.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
        }
    }

    /// ISO code as sent to the payment gateway.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_roundtrip() {
        let money = Money::inr(Decimal::new(129_950, 2));
        assert_eq!(money.to_minor_units(), Some(129_950));
        assert_eq!(
            Money::from_minor_units(129_950, CurrencyCode::INR),
            money
        );
    }

    #[test]
    fn test_new_rounds_midpoint_away_from_zero() {
        let money = Money::inr(Decimal::new(10_005, 3));
        assert_eq!(money.amount, Decimal::new(1001, 2));
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::inr(Decimal::new(129_900, 2)).display(), "₹1,299.00");
        assert_eq!(Money::inr(Decimal::new(5, 1)).display(), "₹0.50");
        assert_eq!(
            Money::inr(Decimal::new(123_456_789, 2)).display(),
            "₹1,234,567.89"
        );
        assert_eq!(Money::inr(Decimal::new(-2500, 2)).display(), "-₹25.00");
    }
}
