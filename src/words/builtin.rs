//! Built-in word lists

use super::{TranslationLanguage, WordPair};

/// A short word with its translations
pub struct BuiltinWord {
    pub word: &'static str,
    pub german: &'static str,
    pub french: &'static str,
    pub spanish: &'static str,
    pub chinese: &'static str,
    pub japanese: &'static str,
}

impl BuiltinWord {
    pub fn translation(&self, language: TranslationLanguage) -> Option<&'static str> {
        match language {
            TranslationLanguage::None => None,
            TranslationLanguage::German => Some(self.german),
            TranslationLanguage::French => Some(self.french),
            TranslationLanguage::Spanish => Some(self.spanish),
            TranslationLanguage::Chinese => Some(self.chinese),
            TranslationLanguage::Japanese => Some(self.japanese),
        }
    }
}

macro_rules! words {
    ($(($word:literal, $de:literal, $fr:literal, $es:literal, $zh:literal, $ja:literal)),* $(,)?) => {
        &[$(BuiltinWord {
            word: $word,
            german: $de,
            french: $fr,
            spanish: $es,
            chinese: $zh,
            japanese: $ja,
        }),*]
    };
}

/// The RandomShort set
pub const BUILTIN_WORDS: &[BuiltinWord] = words![
    ("cat", "Katze", "chat", "gato", "猫", "ねこ"),
    ("dog", "Hund", "chien", "perro", "狗", "いぬ"),
    ("ball", "Ball", "balle", "pelota", "球", "ボール"),
    ("sun", "Sonne", "soleil", "sol", "太阳", "たいよう"),
    ("moon", "Mond", "lune", "luna", "月亮", "つき"),
    ("fish", "Fisch", "poisson", "pez", "鱼", "さかな"),
    ("bird", "Vogel", "oiseau", "pájaro", "鸟", "とり"),
    ("milk", "Milch", "lait", "leche", "牛奶", "ミルク"),
    ("car", "Auto", "voiture", "coche", "汽车", "くるま"),
    ("cup", "Tasse", "tasse", "taza", "杯子", "コップ"),
    ("hat", "Hut", "chapeau", "sombrero", "帽子", "ぼうし"),
    ("duck", "Ente", "canard", "pato", "鸭子", "あひる"),
    ("bear", "Bär", "ours", "oso", "熊", "くま"),
    ("tree", "Baum", "arbre", "árbol", "树", "き"),
    ("star", "Stern", "étoile", "estrella", "星星", "ほし"),
    ("bus", "Bus", "bus", "autobús", "公共汽车", "バス"),
    ("egg", "Ei", "œuf", "huevo", "鸡蛋", "たまご"),
    ("apple", "Apfel", "pomme", "manzana", "苹果", "りんご"),
    ("shoe", "Schuh", "chaussure", "zapato", "鞋", "くつ"),
    ("frog", "Frosch", "grenouille", "rana", "青蛙", "かえる"),
];

/// Look a word up in the built-in table (case-insensitive)
pub fn builtin_translation(word: &str, language: TranslationLanguage) -> Option<&'static str> {
    BUILTIN_WORDS
        .iter()
        .find(|entry| entry.word.eq_ignore_ascii_case(word.trim()))
        .and_then(|entry| entry.translation(language))
}

/// Starting content of the random list before the user edits it
pub fn default_random_words() -> Vec<WordPair> {
    [
        "hello {name}",
        "good job {name}",
        "{name}'s ball",
        "{name}'s teddy",
        "peekaboo {name}",
        "banana",
        "bubbles",
        "kitty",
    ]
    .into_iter()
    .map(|template| WordPair::new(template, ""))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_translation() {
        assert_eq!(builtin_translation("cat", TranslationLanguage::German), Some("Katze"));
        assert_eq!(builtin_translation(" Dog ", TranslationLanguage::French), Some("chien"));
        assert_eq!(builtin_translation("cat", TranslationLanguage::None), None);
        assert_eq!(builtin_translation("zebra", TranslationLanguage::German), None);
    }

    #[test]
    fn test_builtin_words_are_unique_and_non_empty() {
        for (i, entry) in BUILTIN_WORDS.iter().enumerate() {
            assert!(!entry.word.is_empty());
            assert!(BUILTIN_WORDS[i + 1..].iter().all(|other| other.word != entry.word));
        }
    }
}
