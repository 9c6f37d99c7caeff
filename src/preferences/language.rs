//! Spoken-language codes

use serde::{Deserialize, Serialize};

use crate::error::LanguageError;

/// Code used when no valid preference is stored
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Languages the built-in page messages cover, with their display names
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en-US", "English"),
    ("hi-IN", "हिंदी"),
    ("bn-IN", "বাংলা"),
    ("ta-IN", "தமிழ்"),
    ("te-IN", "తెలుగు"),
    ("kn-IN", "ಕನ್ನಡ"),
];

/// A validated BCP-47 style language tag such as `en-US` or `hi`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Parse a language tag of the form `ll`, `lll`, `ll-RR` or `lll-RR`
    pub fn parse(raw: &str) -> Result<Self, LanguageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LanguageError::Empty);
        }

        let mut parts = raw.split('-');
        let primary = parts.next().unwrap_or_default();
        let region = parts.next();

        let primary_ok = (2..=3).contains(&primary.len())
            && primary.chars().all(|c| c.is_ascii_alphabetic());
        let region_ok = match region {
            None => true,
            Some(r) => {
                (r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic()))
                    || (r.len() == 3 && r.chars().all(|c| c.is_ascii_digit()))
            }
        };

        if !primary_ok || !region_ok || parts.next().is_some() {
            return Err(LanguageError::Malformed(raw.to_string()));
        }

        let code = match region {
            Some(r) => format!("{}-{}", primary.to_ascii_lowercase(), r.to_ascii_uppercase()),
            None => primary.to_ascii_lowercase(),
        };
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable name for supported languages
    pub fn display_name(&self) -> Option<&'static str> {
        SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }
}

impl Default for LanguageCode {
    fn default() -> Self {
        Self(DEFAULT_LANGUAGE.to_string())
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LanguageCode {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = LanguageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}
