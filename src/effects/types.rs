//! Effect selection and the per-event settings snapshot

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::words::{TranslationLanguage, WordSetKind};

/// Feedback played for each suppressed key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockEffect {
    #[default]
    None,
    SpeakKey,
    SpeakWord,
    SpeakRandomWord,
    Animate,
}

pub const MIN_WORD_DISPLAY_SECS: f64 = 1.0;
pub const MAX_WORD_DISPLAY_SECS: f64 = 10.0;
pub const DEFAULT_WORD_DISPLAY_SECS: f64 = 3.0;

/// Clamp a display duration into the supported range
pub fn clamp_display_secs(secs: f64) -> f64 {
    if secs.is_finite() {
        secs.clamp(MIN_WORD_DISPLAY_SECS, MAX_WORD_DISPLAY_SECS)
    } else {
        DEFAULT_WORD_DISPLAY_SECS
    }
}

/// Settings the dispatcher reads for each event
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    /// Seconds, always within 1..=10
    pub word_display_duration: f64,
    pub use_personal_voice: bool,
    pub personal_voice: Option<String>,
    pub translation_language: TranslationLanguage,
    pub active_word_set_kind: WordSetKind,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            word_display_duration: DEFAULT_WORD_DISPLAY_SECS,
            use_personal_voice: false,
            personal_voice: None,
            translation_language: TranslationLanguage::None,
            active_word_set_kind: WordSetKind::RandomShort,
        }
    }
}

impl EffectSettings {
    pub fn display_duration(&self) -> Duration {
        Duration::from_secs_f64(clamp_display_secs(self.word_display_duration))
    }

    /// Personal voice name when the user enabled it
    pub fn personal_voice(&self) -> Option<String> {
        if self.use_personal_voice {
            self.personal_voice.clone()
        } else {
            None
        }
    }
}
