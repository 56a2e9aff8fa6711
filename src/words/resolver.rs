//! Word selection with per-set shuffled cursors

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::builtin::{builtin_translation, BUILTIN_WORDS};
use super::template::apply_name;
use super::{ResolvedWord, TranslationLanguage, WordPair, WordSet, WordSetError, WordSetKind};

/// Walks a shuffled permutation of a set, reshuffling when exhausted
#[derive(Debug, Default)]
struct ShuffleCursor {
    order: Vec<usize>,
    pos: usize,
    /// Last index actually handed out, skipped entries excluded
    last: Option<usize>,
}

impl ShuffleCursor {
    /// Next index accepted by `usable`, or `None` if a full pass finds none
    fn next(&mut self, len: usize, rng: &mut impl Rng, usable: impl Fn(usize) -> bool) -> Option<usize> {
        if self.order.len() != len {
            self.order = (0..len).collect();
            self.pos = len;
        }

        // The rest of the current pass, then at most one fresh pass
        for _ in 0..2 {
            while self.pos < self.order.len() {
                let index = self.order[self.pos];
                self.pos += 1;
                if usable(index) {
                    self.last = Some(index);
                    return Some(index);
                }
            }
            self.reshuffle(rng, &usable);
        }
        None
    }

    fn reshuffle(&mut self, rng: &mut impl Rng, usable: &impl Fn(usize) -> bool) {
        self.order.shuffle(rng);
        self.pos = 0;

        // No immediate repeat across the reshuffle boundary
        let mut usable_at = (0..self.order.len()).filter(|&p| usable(self.order[p]));
        let Some(first) = usable_at.next() else {
            return;
        };
        if Some(self.order[first]) != self.last {
            return;
        }
        let later: Vec<usize> = usable_at.collect();
        if !later.is_empty() {
            let swap_with = later[rng.random_range(0..later.len())];
            self.order.swap(first, swap_with);
        }
    }
}

struct ResolverState {
    main_words: Vec<WordPair>,
    random_words: Vec<WordPair>,
    baby_name: Option<String>,
    cursors: HashMap<WordSetKind, ShuffleCursor>,
    rng: StdRng,
}

impl ResolverState {
    fn next_builtin(&mut self, language: TranslationLanguage) -> ResolvedWord {
        let index = self
            .cursors
            .entry(WordSetKind::RandomShort)
            .or_default()
            .next(BUILTIN_WORDS.len(), &mut self.rng, |_| true)
            .unwrap_or(0);
        let entry = &BUILTIN_WORDS[index];
        ResolvedWord {
            text: entry.word.to_string(),
            translation: entry.translation(language).map(str::to_owned),
        }
    }

    fn next_main(&mut self, language: TranslationLanguage) -> Option<ResolvedWord> {
        let index = self
            .cursors
            .entry(WordSetKind::MainWords)
            .or_default()
            .next(self.main_words.len(), &mut self.rng, |_| true)?;
        let pair = &self.main_words[index];
        let text = pair.source_word.clone();
        let translation = translate(&text, &pair.translation, language);
        Some(ResolvedWord { text, translation })
    }

    fn next_random(&mut self, language: TranslationLanguage) -> Option<ResolvedWord> {
        let words = &self.random_words;
        let name = self.baby_name.as_deref();

        // Templates that collapse to nothing without a name are skipped
        let index = self
            .cursors
            .entry(WordSetKind::RandomWithName)
            .or_default()
            .next(words.len(), &mut self.rng, |i| {
                !apply_name(&words[i].source_word, name).is_empty()
            })?;

        let pair = &words[index];
        let text = apply_name(&pair.source_word, name);
        let translation = translate(&text, &apply_name(&pair.translation, name), language);
        Some(ResolvedWord { text, translation })
    }
}

/// Explicit translation first, then the built-in table
fn translate(text: &str, explicit: &str, language: TranslationLanguage) -> Option<String> {
    if !language.is_enabled() {
        return None;
    }
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Some(explicit.to_string());
    }
    builtin_translation(text, language).map(str::to_owned)
}

fn sanitize(words: Vec<WordPair>) -> Vec<WordPair> {
    words
        .into_iter()
        .filter_map(|pair| {
            let source_word = pair.source_word.trim();
            (!source_word.is_empty()).then(|| WordPair::new(source_word, pair.translation.trim()))
        })
        .collect()
}

/// Resolves the next word to speak from the active set
pub struct WordSetResolver {
    state: Mutex<ResolverState>,
}

impl WordSetResolver {
    pub fn new(main_words: Vec<WordPair>, random_words: Vec<WordPair>, baby_name: Option<String>) -> Self {
        Self::with_rng(main_words, random_words, baby_name, StdRng::from_os_rng())
    }

    /// Deterministic resolver for tests
    #[cfg(test)]
    pub fn seeded(main_words: Vec<WordPair>, random_words: Vec<WordPair>, seed: u64) -> Self {
        Self::with_rng(main_words, random_words, None, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        main_words: Vec<WordPair>,
        random_words: Vec<WordPair>,
        baby_name: Option<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            state: Mutex::new(ResolverState {
                main_words: sanitize(main_words),
                random_words: sanitize(random_words),
                baby_name: normalize_name(baby_name),
                cursors: HashMap::new(),
                rng,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the next word of a set
    ///
    /// An empty MainWords list is an error so the UI can prompt for words.
    /// An empty (or all-placeholder) random list falls back to RandomShort.
    pub fn next(&self, kind: WordSetKind, language: TranslationLanguage) -> Result<ResolvedWord, WordSetError> {
        let mut state = self.lock();

        match kind {
            WordSetKind::RandomShort => Ok(state.next_builtin(language)),
            WordSetKind::MainWords => {
                state
                    .next_main(language)
                    .ok_or(WordSetError::EmptyWordSet(WordSetKind::MainWords))
            }
            WordSetKind::RandomWithName => match state.next_random(language) {
                Some(word) => Ok(word),
                None => {
                    debug!("random word list has no usable words, using built-in set");
                    Ok(state.next_builtin(language))
                }
            },
        }
    }

    /// Snapshot of a set for the word editor
    pub fn current_word_set(&self, kind: WordSetKind) -> WordSet {
        let state = self.lock();
        let words = match kind {
            WordSetKind::RandomShort => BUILTIN_WORDS
                .iter()
                .map(|entry| WordPair::new(entry.word, ""))
                .collect(),
            WordSetKind::MainWords => state.main_words.clone(),
            WordSetKind::RandomWithName => state.random_words.clone(),
        };
        WordSet {
            kind,
            words,
            baby_name: match kind {
                WordSetKind::RandomWithName => state.baby_name.clone(),
                _ => None,
            },
        }
    }

    /// Replace the main word list, returning how many words were kept
    pub fn update_main_words(&self, words: Vec<WordPair>) -> usize {
        let mut state = self.lock();
        state.main_words = sanitize(words);
        state.cursors.remove(&WordSetKind::MainWords);
        state.main_words.len()
    }

    /// Replace the random word list, returning how many words were kept
    pub fn update_random_words(&self, words: Vec<WordPair>) -> usize {
        let mut state = self.lock();
        state.random_words = sanitize(words);
        state.cursors.remove(&WordSetKind::RandomWithName);
        state.random_words.len()
    }

    pub fn set_baby_name(&self, name: Option<String>) {
        self.lock().baby_name = normalize_name(name);
    }
}

fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
