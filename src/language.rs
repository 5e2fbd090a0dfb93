//! Supported conversation languages.
//!
//! The same tag drives speech recognition, the backend `lang` field, cloud
//! voice selection and the local synthesizer.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A language the assistants can converse in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LanguageCode {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "hi-IN")]
    HiIn,
    #[serde(rename = "te-IN")]
    TeIn,
    #[serde(rename = "kn-IN")]
    KnIn,
}

impl LanguageCode {
    /// Every supported language, in selector order.
    pub const ALL: [LanguageCode; 4] = [Self::EnUs, Self::TeIn, Self::HiIn, Self::KnIn];

    /// BCP-47 tag as sent on the wire.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::HiIn => "hi-IN",
            Self::TeIn => "te-IN",
            Self::KnIn => "kn-IN",
        }
    }

    /// Human-readable name for language pickers.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::EnUs => "English",
            Self::HiIn => "Hindi",
            Self::TeIn => "Telugu",
            Self::KnIn => "Kannada",
        }
    }

    /// Parse a tag, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|code| code.as_tag().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for LanguageCode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| SessionError::UnknownLanguage(s.to_owned()))
    }
}

/// The active language selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub active: LanguageCode,
}

impl LanguageProfile {
    pub fn new(active: LanguageCode) -> Self {
        Self { active }
    }
}
