//! Customer-facing order numbers.

use core::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// An order number of the form `M{yy}{counter:05}`, e.g. `M2501111`.
///
/// The counter is per calendar year and starts at [`OrderNumber::FIRST_COUNTER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const FIRST_COUNTER: i32 = 1111;

    /// Format an order number from a four digit year and the year's counter.
    #[must_use]
    pub fn format(year: i32, counter: i32) -> Self {
        Self(format!("M{:02}{counter:05}", year.rem_euclid(100)))
    }

    #[must_use]
    pub fn for_date<D: Datelike>(date: &D, counter: i32) -> Self {
        Self::format(date.year(), counter)
    }

    /// Accepts a stored or user-typed order number.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_uppercase();
        let digits = s.strip_prefix('M')?;
        (digits.len() >= 7 && digits.bytes().all(|b| b.is_ascii_digit())).then_some(Self(s))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn formats_two_digit_year_and_padded_counter() {
        assert_eq!(OrderNumber::format(2025, 1111).as_str(), "M2501111");
        assert_eq!(OrderNumber::format(2030, 123_456).as_str(), "M30123456");
        assert_eq!(OrderNumber::format(2009, 7).as_str(), "M0900007");
    }

    #[test]
    fn for_date_uses_calendar_year() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap_or_default();
        assert_eq!(OrderNumber::for_date(&date, 1112).as_str(), "M2601112");
    }

    #[test]
    fn parse_normalizes() {
        assert_eq!(
            OrderNumber::parse(" m2501111 ").map(|n| n.to_string()),
            Some("M2501111".to_owned())
        );
        assert!(OrderNumber::parse("2501111").is_none());
        assert!(OrderNumber::parse("M25A1111").is_none());
        assert!(OrderNumber::parse("M25011").is_none());
    }
}
