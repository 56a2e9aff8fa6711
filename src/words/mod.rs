//! Word sets, translation lookup and word selection

mod builtin;
mod resolver;
mod template;

use serde::{Deserialize, Serialize};

pub use builtin::default_random_words;
pub use resolver::WordSetResolver;

/// A user-editable word with its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub source_word: String,
    #[serde(default)]
    pub translation: String,
}

impl WordPair {
    pub fn new(source_word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source_word: source_word.into(),
            translation: translation.into(),
        }
    }
}

/// Which collection of words to draw from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordSetKind {
    /// Fixed built-in short words
    #[default]
    RandomShort,
    /// The user's edited word list
    MainWords,
    /// The random list with baby-name templates
    RandomWithName,
}

impl std::fmt::Display for WordSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WordSetKind::RandomShort => write!(f, "RandomShort"),
            WordSetKind::MainWords => write!(f, "MainWords"),
            WordSetKind::RandomWithName => write!(f, "RandomWithName"),
        }
    }
}

/// Snapshot of a word collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordSet {
    pub kind: WordSetKind,
    pub words: Vec<WordPair>,
    pub baby_name: Option<String>,
}

/// Language words are translated into for speech and display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationLanguage {
    #[default]
    None,
    German,
    French,
    Spanish,
    Chinese,
    Japanese,
}

impl TranslationLanguage {
    pub fn is_enabled(&self) -> bool {
        *self != TranslationLanguage::None
    }

    /// Stock macOS voice that speaks this language
    pub fn voice(&self) -> Option<&'static str> {
        match self {
            TranslationLanguage::None => None,
            TranslationLanguage::German => Some("Anna"),
            TranslationLanguage::French => Some("Thomas"),
            TranslationLanguage::Spanish => Some("Monica"),
            TranslationLanguage::Chinese => Some("Tingting"),
            TranslationLanguage::Japanese => Some("Kyoko"),
        }
    }
}

/// A word picked for one key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWord {
    pub text: String,
    pub translation: Option<String>,
}

impl ResolvedWord {
    /// The text to speak and show first: the translation when there is one
    pub fn primary(&self) -> &str {
        self.translation.as_deref().unwrap_or(&self.text)
    }

    /// The untranslated word, shown under a translation
    pub fn secondary(&self) -> Option<&str> {
        self.translation.as_ref().map(|_| self.text.as_str())
    }
}

/// Errors from word resolution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WordSetError {
    #[error("word set {0} is empty")]
    EmptyWordSet(WordSetKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_word_prefers_translation() {
        let word = ResolvedWord {
            text: "cat".into(),
            translation: Some("Katze".into()),
        };
        assert_eq!(word.primary(), "Katze");
        assert_eq!(word.secondary(), Some("cat"));

        let plain = ResolvedWord {
            text: "cat".into(),
            translation: None,
        };
        assert_eq!(plain.primary(), "cat");
        assert_eq!(plain.secondary(), None);
    }

    #[test]
    fn test_word_pair_deserialization_defaults_translation() {
        let pair: WordPair = serde_json::from_str(r#"{"source_word":"dog"}"#).unwrap();
        assert_eq!(pair, WordPair::new("dog", ""));
    }
}
