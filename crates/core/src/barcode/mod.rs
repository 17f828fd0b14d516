//! EAN-13 barcodes.
//!
//! Momtazchem products carry GS1 EAN-13 codes laid out as
//! `846-96771-PPPP-C`: Iraq's GS1 prefix, the company code, a four digit
//! product code and the modulo-10 check digit.
//!
//! ```
//! use momtazchem_core::Ean13;
//!
//! let code = Ean13::for_product(1234).unwrap();
//! assert_eq!(code.as_str(), "8469677112348");
//! assert!(code.is_company_code());
//!
//! assert!(Ean13::parse("8469677112349").is_err());
//! ```

pub mod svg;

use core::fmt;

use serde::{Deserialize, Serialize};

/// GS1 prefix assigned to Iraq.
pub const COUNTRY_PREFIX: &str = "846";
/// Momtazchem's GS1 company code.
pub const COMPANY_CODE: &str = "96771";
/// Smallest product code handed out by the generator.
pub const MIN_PRODUCT_CODE: u16 = 1000;
/// Largest product code that fits the four digit slot.
pub const MAX_PRODUCT_CODE: u16 = 9999;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Ean13Error {
    #[error("barcode must be exactly 13 digits, got {0}")]
    InvalidLength(usize),
    #[error("barcode may only contain digits")]
    NonDigit,
    #[error("check digit should be {expected}, got {actual}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("product code {0} does not fit the four digit slot")]
    ProductCodeOutOfRange(u32),
}

/// Compute the EAN-13 check digit for the first twelve digits.
///
/// Digits at even indexes weigh 1, odd indexes weigh 3.
#[must_use]
pub fn check_digit(digits: &[u8; 12]) -> u8 {
    let total: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    // Always < 10, so the narrowing is lossless
    u8::try_from((10 - total % 10) % 10).unwrap_or(0)
}

/// A validated EAN-13 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ean13 {
    digits: [u8; 13],
}

/// The GS1 fields of a company barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ean13Components {
    pub country_prefix: String,
    pub company_code: String,
    pub product_code: String,
    pub check_digit: u8,
}

impl Ean13 {
    /// Parse a 13 digit string and verify its check digit.
    ///
    /// Surrounding whitespace from scanner input is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for wrong length, non-digit characters or a
    /// mismatched check digit.
    pub fn parse(s: &str) -> Result<Self, Ean13Error> {
        let s = s.trim();
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Ean13Error::NonDigit);
        }
        let bytes = s.as_bytes();
        let Ok(raw) = <[u8; 13]>::try_from(bytes) else {
            return Err(Ean13Error::InvalidLength(s.chars().count()));
        };

        let digits = raw.map(|b| b - b'0');
        let mut body = [0_u8; 12];
        body.copy_from_slice(&digits[..12]);
        let expected = check_digit(&body);
        let actual = digits[12];
        if expected != actual {
            return Err(Ean13Error::ChecksumMismatch { expected, actual });
        }
        Ok(Self { digits })
    }

    /// Build a code from its twelve leading digits, appending the check digit.
    #[must_use]
    pub fn from_body(body: [u8; 12]) -> Self {
        let mut digits = [0_u8; 13];
        digits[..12].copy_from_slice(&body);
        digits[12] = check_digit(&body);
        Self { digits }
    }

    /// Build a company barcode for a four digit product code.
    ///
    /// # Errors
    ///
    /// Returns [`Ean13Error::ProductCodeOutOfRange`] above 9999.
    pub fn for_product(product_code: u16) -> Result<Self, Ean13Error> {
        if product_code > MAX_PRODUCT_CODE {
            return Err(Ean13Error::ProductCodeOutOfRange(u32::from(product_code)));
        }
        let text = format!("{COUNTRY_PREFIX}{COMPANY_CODE}{product_code:04}");
        let mut body = [0_u8; 12];
        for (slot, b) in body.iter_mut().zip(text.bytes()) {
            *slot = b - b'0';
        }
        Ok(Self::from_body(body))
    }

    #[must_use]
    pub const fn digits(&self) -> &[u8; 13] {
        &self.digits
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }

    #[must_use]
    pub const fn check(&self) -> u8 {
        self.digits[12]
    }

    /// Split into the `846-96771-PPPP-C` fields.
    #[must_use]
    pub fn components(&self) -> Ean13Components {
        let text = self.as_str();
        Ean13Components {
            country_prefix: text[..3].to_owned(),
            company_code: text[3..8].to_owned(),
            product_code: text[8..12].to_owned(),
            check_digit: self.check(),
        }
    }

    /// Whether this code was issued under Momtazchem's GS1 company prefix.
    #[must_use]
    pub fn is_company_code(&self) -> bool {
        self.as_str().starts_with(&format!("{COUNTRY_PREFIX}{COMPANY_CODE}"))
    }

    /// Product code slot of a company barcode.
    #[must_use]
    pub fn product_code(&self) -> Option<u16> {
        if !self.is_company_code() {
            return None;
        }
        self.components().product_code.parse().ok()
    }

    /// The 95 bar modules, `true` for a dark bar.
    #[must_use]
    pub fn modules(&self) -> [bool; 95] {
        let mut out = [false; 95];
        let mut pos = 0;
        let mut push = |pattern: &str| {
            for bit in pattern.bytes() {
                if let Some(slot) = out.get_mut(pos) {
                    *slot = bit == b'1';
                }
                pos += 1;
            }
        };

        let parity = PARITY[usize::from(self.digits[0])];
        push("101");
        for (i, d) in self.digits[1..7].iter().enumerate() {
            let table = if parity.as_bytes().get(i) == Some(&b'G') {
                &G_CODES
            } else {
                &L_CODES
            };
            push(table[usize::from(*d)]);
        }
        push("01010");
        for d in &self.digits[7..13] {
            push(R_CODES[usize::from(*d)]);
        }
        push("101");
        out
    }
}

impl fmt::Display for Ean13 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl std::str::FromStr for Ean13 {
    type Err = Ean13Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ean13 {
    type Error = Ean13Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ean13> for String {
    fn from(code: Ean13) -> Self {
        code.as_str()
    }
}

const L_CODES: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
    "0110111", "0001011",
];
const G_CODES: [&str; 10] = [
    "0100111", "0110011", "0011011", "0100001", "0011101", "0111001", "0000101", "0010001",
    "0001001", "0010111",
];
const R_CODES: [&str; 10] = [
    "1110010", "1100110", "1101100", "1000010", "1011100", "1001110", "1010000", "1000100",
    "1001000", "1110100",
];
// Left-half encoding chosen by the first digit
const PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLG", "LGLGLG", "LGLGGL",
    "LGGLGL",
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn check_digit_known_codes() {
        assert_eq!(check_digit(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3]), 1);
        assert_eq!(check_digit(&[8, 4, 6, 9, 6, 7, 7, 1, 1, 2, 3, 4]), 8);
        assert_eq!(check_digit(&[0; 12]), 0);
    }

    #[test]
    fn parse_accepts_valid_codes() {
        assert!(Ean13::parse("4006381333931").is_ok());
        assert!(Ean13::parse(" 8469677112348\n").is_ok());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Ean13::parse("123"), Err(Ean13Error::InvalidLength(3)));
        assert_eq!(Ean13::parse("40063813339311"), Err(Ean13Error::InvalidLength(14)));
        assert_eq!(Ean13::parse("40063813339a1"), Err(Ean13Error::NonDigit));
        assert_eq!(
            Ean13::parse("4006381333932"),
            Err(Ean13Error::ChecksumMismatch {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn every_single_digit_error_is_caught() {
        let valid = "8469677112348";
        for pos in 0..13 {
            let mut bytes = valid.as_bytes().to_vec();
            bytes[pos] = if bytes[pos] == b'9' { b'0' } else { bytes[pos] + 1 };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(Ean13::parse(&mutated).is_err(), "{mutated} should fail");
        }
    }

    #[test]
    fn for_product_builds_company_codes() {
        let code = Ean13::for_product(42).unwrap();
        assert_eq!(&code.as_str()[..12], "846967710042");
        assert!(Ean13::parse(&code.as_str()).is_ok());
        assert_eq!(code.product_code(), Some(42));
        assert!(matches!(
            Ean13::for_product(10_000),
            Err(Ean13Error::ProductCodeOutOfRange(10_000))
        ));
    }

    #[test]
    fn components_split_gs1_fields() {
        let parts = Ean13::parse("8469677112348").unwrap().components();
        assert_eq!(parts.country_prefix, "846");
        assert_eq!(parts.company_code, "96771");
        assert_eq!(parts.product_code, "1234");
        assert_eq!(parts.check_digit, 8);
    }

    #[test]
    fn foreign_codes_are_not_company_codes() {
        let code = Ean13::parse("4006381333931").unwrap();
        assert!(!code.is_company_code());
        assert_eq!(code.product_code(), None);
    }

    #[test]
    fn modules_have_guards_in_place() {
        let bars = Ean13::parse("4006381333931").unwrap().modules();
        assert_eq!(&bars[..3], &[true, false, true]);
        assert_eq!(&bars[45..50], &[false, true, false, true, false]);
        assert_eq!(&bars[92..], &[true, false, true]);
        // First digit 4 encodes 0 in the L set
        assert_eq!(&bars[3..10], &[false, false, false, true, true, false, true]);
    }

    #[test]
    fn serde_validates() {
        let ok: Result<Ean13, _> = serde_json::from_str("\"8469677112348\"");
        assert!(ok.is_ok());
        let bad: Result<Ean13, _> = serde_json::from_str("\"8469677112340\"");
        assert!(bad.is_err());
    }
}
