//! Decimal money amounts.
//!
//! Every price, discount, shipping cost and tax amount in the platform is a
//! [`Decimal`] rounded with [`round_money`] at component boundaries.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, midpoint away from zero.
///
/// ```
/// use momtazchem_core::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Currencies accepted for orders. Iraqi dinar is the store default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    IQD,
    USD,
    EUR,
}

impl Currency {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::IQD => "IQD",
            Self::USD => "USD",
            Self::EUR => "EUR",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::IQD => "IQD",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IQD" => Ok(Self::IQD),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// An amount in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    #[must_use]
    pub const fn iqd(amount: Decimal) -> Self {
        Self::new(amount, Currency::IQD)
    }

    #[must_use]
    pub fn rounded(self) -> Self {
        Self::new(round_money(self.amount), self.currency)
    }

    /// Adds two amounts of the same currency.
    ///
    /// Returns `None` when the currencies differ or the sum overflows.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.currency != other.currency {
            return None;
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency))
    }

    /// Human readable form used on invoices, e.g. `$12.50` or `15,000.00 IQD`.
    #[must_use]
    pub fn display(&self) -> String {
        let amount = group_thousands(round_money(self.amount));
        match self.currency {
            Currency::IQD => format!("{amount} IQD"),
            Currency::USD | Currency::EUR => format!("{}{amount}", self.currency.symbol()),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn group_thousands(amount: Decimal) -> String {
    let text = format!("{amount:.2}");
    let (sign, digits) = text
        .strip_prefix('-')
        .map_or(("", text.as_str()), |rest| ("-", rest));
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(105, 3)), Decimal::new(11, 2));
        assert_eq!(round_money(Decimal::new(-105, 3)), Decimal::new(-11, 2));
        assert_eq!(round_money(Decimal::new(104, 3)), Decimal::new(10, 2));
    }

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Money::iqd(Decimal::new(1_500_000, 0)).display(), "1,500,000.00 IQD");
        assert_eq!(Money::iqd(Decimal::new(999, 0)).display(), "999.00 IQD");
        assert_eq!(
            Money::new(Decimal::new(125_050, 2), Currency::USD).display(),
            "$1,250.50"
        );
    }

    #[test]
    fn checked_add_requires_same_currency() {
        let a = Money::iqd(Decimal::ONE);
        let b = Money::new(Decimal::ONE, Currency::USD);
        assert!(a.checked_add(b).is_none());
        assert_eq!(a.checked_add(a).map(|m| m.amount), Some(Decimal::TWO));
    }

    #[test]
    fn currency_parses_case_insensitively() {
        assert_eq!("iqd".parse::<Currency>(), Ok(Currency::IQD));
        assert!("gbp".parse::<Currency>().is_err());
    }
}
