//! Static language → cloud voice table.

use crate::language::LanguageCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Voice parameters sent to the cloud synthesis provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    pub voice_id: String,
    pub engine: String,
}

impl VoiceSelection {
    fn neural(voice_id: &str) -> Self {
        Self {
            voice_id: voice_id.to_owned(),
            engine: "neural".to_owned(),
        }
    }
}

/// Default voice for a language. Kannada has no dedicated voice and borrows
/// the Hindi one.
pub fn default_voice(language: LanguageCode) -> VoiceSelection {
    match language {
        LanguageCode::EnUs => VoiceSelection::neural("Joanna"),
        LanguageCode::HiIn | LanguageCode::KnIn => VoiceSelection::neural("Aditi"),
        LanguageCode::TeIn => VoiceSelection::neural("Neeraja"),
    }
}

/// Resolve the voice for `language`, preferring a config override keyed by
/// language tag.
pub fn resolve_voice(
    overrides: &BTreeMap<String, VoiceSelection>,
    language: LanguageCode,
) -> VoiceSelection {
    overrides
        .get(language.as_tag())
        .cloned()
        .unwrap_or_else(|| default_voice(language))
}
