//! Persisted user settings and word lists

mod store;

use serde::{Deserialize, Serialize};

use crate::effects::{clamp_display_secs, EffectSettings, LockEffect, DEFAULT_WORD_DISPLAY_SECS};
use crate::words::{default_random_words, TranslationLanguage, WordPair, WordSetKind};

pub use store::{SettingsError, SettingsStore};

/// User settings as stored in `settings.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "selectedLockEffect")]
    pub lock_effect: LockEffect,

    #[serde(rename = "selectedTranslationLanguage")]
    pub translation_language: TranslationLanguage,

    #[serde(rename = "selectedWordSetType")]
    pub word_set_kind: WordSetKind,

    #[serde(rename = "wordDisplayDuration")]
    pub word_display_duration: f64,

    #[serde(rename = "usePersonalVoice")]
    pub use_personal_voice: bool,

    #[serde(rename = "personalVoice")]
    pub personal_voice: Option<String>,

    #[serde(rename = "lockKeyboardOnLaunch")]
    pub lock_keyboard_on_launch: bool,

    #[serde(rename = "babyName")]
    pub baby_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lock_effect: LockEffect::None,
            translation_language: TranslationLanguage::None,
            word_set_kind: WordSetKind::RandomShort,
            word_display_duration: DEFAULT_WORD_DISPLAY_SECS,
            use_personal_voice: false,
            personal_voice: None,
            lock_keyboard_on_launch: false,
            baby_name: None,
        }
    }
}

impl Settings {
    /// The part of the settings the effect dispatcher reads per event
    pub fn effect_settings(&self) -> EffectSettings {
        EffectSettings {
            word_display_duration: clamp_display_secs(self.word_display_duration),
            use_personal_voice: self.use_personal_voice,
            personal_voice: self.personal_voice.clone(),
            translation_language: self.translation_language,
            active_word_set_kind: self.word_set_kind,
        }
    }

    /// Apply a partial update; returns whether anything changed
    pub fn apply(&mut self, update: SettingsUpdate) -> bool {
        let before = self.clone();

        if let Some(language) = update.translation_language {
            self.translation_language = language;
        }
        if let Some(kind) = update.word_set_kind {
            self.word_set_kind = kind;
        }
        if let Some(secs) = update.word_display_duration {
            self.word_display_duration = clamp_display_secs(secs);
        }
        if let Some(enabled) = update.use_personal_voice {
            self.use_personal_voice = enabled;
        }
        if let Some(voice) = update.personal_voice {
            self.personal_voice = non_empty(voice);
        }
        if let Some(enabled) = update.lock_keyboard_on_launch {
            self.lock_keyboard_on_launch = enabled;
        }
        if let Some(name) = update.baby_name {
            self.baby_name = non_empty(name);
        }

        *self != before
    }
}

// An empty string clears the field
fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Partial settings change; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub translation_language: Option<TranslationLanguage>,
    pub word_set_kind: Option<WordSetKind>,
    pub word_display_duration: Option<f64>,
    pub use_personal_voice: Option<bool>,
    pub personal_voice: Option<String>,
    pub lock_keyboard_on_launch: Option<bool>,
    pub baby_name: Option<String>,
}

/// User-edited word lists as stored in `words.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WordLists {
    pub main_words: Vec<WordPair>,
    pub random_words: Vec<WordPair>,
}

impl Default for WordLists {
    fn default() -> Self {
        Self {
            main_words: Vec::new(),
            random_words: default_random_words(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_use_stored_key_names() {
        let settings = Settings {
            lock_effect: LockEffect::SpeakWord,
            baby_name: Some("Mia".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains(r#""selectedLockEffect":"speak_word""#));
        assert!(json.contains(r#""babyName":"Mia""#));
        assert!(json.contains(r#""lockKeyboardOnLaunch":false"#));
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"selectedTranslationLanguage":"german"}"#).unwrap();
        assert_eq!(settings.translation_language, TranslationLanguage::German);
        assert_eq!(settings.word_display_duration, DEFAULT_WORD_DISPLAY_SECS);
        assert_eq!(settings.lock_effect, LockEffect::None);
    }

    #[test]
    fn test_apply_update() {
        let mut settings = Settings::default();
        let changed = settings.apply(SettingsUpdate {
            word_display_duration: Some(25.0),
            baby_name: Some("  Leo ".into()),
            ..Default::default()
        });
        assert!(changed);
        assert_eq!(settings.word_display_duration, 10.0);
        assert_eq!(settings.baby_name.as_deref(), Some("Leo"));

        assert!(!settings.apply(SettingsUpdate::default()));

        settings.apply(SettingsUpdate {
            baby_name: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(settings.baby_name, None);
    }

    #[test]
    fn test_effect_settings_clamps_stored_duration() {
        let settings = Settings {
            word_display_duration: 0.0,
            ..Default::default()
        };
        assert_eq!(settings.effect_settings().word_display_duration, 1.0);
    }
}
