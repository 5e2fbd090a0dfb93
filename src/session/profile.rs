//! Assistant profiles.
//!
//! The career guide, query handler and role-based interviewer widgets share
//! one session engine; a profile carries only what differs between them.

use crate::language::LanguageCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which assistant surface a profile describes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    CareerGuide,
    QueryHandler,
    RoleBasedInterviewer,
}

impl ProfileKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CareerGuide => "career_guide",
            Self::QueryHandler => "query_handler",
            Self::RoleBasedInterviewer => "role_based_interviewer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "career_guide" | "career" => Some(Self::CareerGuide),
            "query_handler" | "query" => Some(Self::QueryHandler),
            "role_based_interviewer" | "interviewer" => Some(Self::RoleBasedInterviewer),
            _ => None,
        }
    }
}

/// Presentation and payload parameters for one assistant surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantProfile {
    pub kind: ProfileKind,
    /// Title shown above the chat.
    pub title: String,
    /// Empty-log placeholder text keyed by language tag.
    pub greetings: BTreeMap<String, String>,
    /// Whether the surface needs the camera while the controller runs.
    pub requires_camera: bool,
    /// Whether the backend payload carries the `lang` field.
    pub send_language: bool,
    /// Language selected before the first turn.
    pub default_language: LanguageCode,
}

impl Default for AssistantProfile {
    fn default() -> Self {
        Self::preset(ProfileKind::default())
    }
}

impl AssistantProfile {
    /// Built-in profile for each assistant surface.
    pub fn preset(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::CareerGuide => Self {
                kind,
                title: "AI Career Guide".to_owned(),
                greetings: chat_greetings(),
                requires_camera: false,
                send_language: true,
                default_language: LanguageCode::EnUs,
            },
            ProfileKind::QueryHandler => Self {
                kind,
                title: "AI Query Handler".to_owned(),
                greetings: chat_greetings(),
                requires_camera: false,
                send_language: true,
                default_language: LanguageCode::EnUs,
            },
            ProfileKind::RoleBasedInterviewer => Self {
                kind,
                title: "AI Interviewer".to_owned(),
                greetings: BTreeMap::from([(
                    LanguageCode::EnUs.as_tag().to_owned(),
                    "Start the interview by typing your first message...".to_owned(),
                )]),
                requires_camera: true,
                send_language: false,
                default_language: LanguageCode::EnUs,
            },
        }
    }

    /// Placeholder for `language`, falling back to English, then to nothing.
    pub fn greeting(&self, language: LanguageCode) -> &str {
        self.greetings
            .get(language.as_tag())
            .or_else(|| self.greetings.get(LanguageCode::EnUs.as_tag()))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn chat_greetings() -> BTreeMap<String, String> {
    [
        (
            LanguageCode::EnUs,
            "Start the conversation by typing or speaking...",
        ),
        (
            LanguageCode::HiIn,
            "टाइप करके या बोलकर बातचीत शुरू करें...",
        ),
        (
            LanguageCode::TeIn,
            "టైప్ చేసి లేదా మాట్లాడి సంభాషణ ప్రారంభించండి...",
        ),
        (
            LanguageCode::KnIn,
            "ಟೈಪ್ ಮಾಡಿ ಅಥವಾ ಮಾತನಾಡಿ ಸಂಭಾಷಣೆ ಪ್ರಾರಂಭಿಸಿ...",
        ),
    ]
    .into_iter()
    .map(|(code, text)| (code.as_tag().to_owned(), text.to_owned()))
    .collect()
}
