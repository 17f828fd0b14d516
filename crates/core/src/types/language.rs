//! Content languages.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language code: {0}")]
pub struct LanguageError(pub String);

/// Languages the storefront, footer and SEO content are published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
    Ku,
    Tr,
}

impl Language {
    pub const ALL: [Self; 4] = [Self::En, Self::Ar, Self::Ku, Self::Tr];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
            Self::Ku => "ku",
            Self::Tr => "tr",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ar => "Arabic",
            Self::Ku => "Kurdish",
            Self::Tr => "Turkish",
        }
    }

    /// Arabic and Sorani Kurdish are written right to left.
    #[must_use]
    pub const fn is_rtl(self) -> bool {
        matches!(self, Self::Ar | Self::Ku)
    }

    #[must_use]
    pub const fn dir(self) -> &'static str {
        if self.is_rtl() { "rtl" } else { "ltr" }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            "ku" => Ok(Self::Ku),
            "tr" => Ok(Self::Tr),
            other => Err(LanguageError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtl_languages() {
        assert!(Language::Ar.is_rtl());
        assert!(Language::Ku.is_rtl());
        assert!(!Language::En.is_rtl());
        assert_eq!(Language::Tr.dir(), "ltr");
    }

    #[test]
    fn parses_codes() {
        assert_eq!("AR".parse::<Language>(), Ok(Language::Ar));
        assert_eq!(
            "fa".parse::<Language>(),
            Err(LanguageError("fa".to_owned()))
        );
    }

    #[test]
    fn all_codes_roundtrip() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>(), Ok(lang));
        }
    }
}
