//! Runs the selected feedback effect for each captured key
//!
//! The dispatcher is the consumer side of the hook handoff. It takes key
//! events in arrival order, reads the current effect and settings snapshot,
//! and issues speech and overlay requests before taking the next event.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::types::{EffectSettings, LockEffect};
use crate::events::LockEvent;
use crate::intercept::KeyEvent;
use crate::overlay::OverlaySession;
use crate::speech::{EnqueueOutcome, SpeechQueue, VoicePreference};
use crate::state::LockState;
use crate::words::{ResolvedWord, TranslationLanguage, WordSetError, WordSetKind, WordSetResolver};

/// Live inputs the dispatcher reads per event
pub struct DispatchInputs {
    pub lock: watch::Receiver<LockState>,
    pub effect: watch::Receiver<LockEffect>,
    pub settings: watch::Receiver<EffectSettings>,
}

/// Effect state machine fed by the input hook
pub struct EffectDispatcher {
    resolver: Arc<WordSetResolver>,
    speech: SpeechQueue,
    overlays: Arc<OverlaySession>,
    inputs: DispatchInputs,
    event_tx: broadcast::Sender<LockEvent>,
    empty_reported: bool,
}

impl EffectDispatcher {
    pub fn new(
        resolver: Arc<WordSetResolver>,
        speech: SpeechQueue,
        overlays: Arc<OverlaySession>,
        inputs: DispatchInputs,
        event_tx: broadcast::Sender<LockEvent>,
    ) -> Self {
        Self {
            resolver,
            speech,
            overlays,
            inputs,
            event_tx,
            empty_reported: false,
        }
    }

    /// Consume key events until the hook side of the channel closes
    pub async fn run(mut self, mut key_rx: mpsc::Receiver<KeyEvent>) {
        info!("effect dispatcher started");

        while let Some(event) = key_rx.recv().await {
            let lock = *self.inputs.lock.borrow();
            if !(lock.is_locked && lock.permission_granted) {
                debug!(
                    key_code = event.key_code,
                    ?lock,
                    "discarding key event received outside an active lock"
                );
                continue;
            }

            let effect = *self.inputs.effect.borrow();
            let settings = self.inputs.settings.borrow().clone();
            self.handle(&event, effect, &settings);
        }

        info!("effect dispatcher stopped");
    }

    /// Run one effect for one key
    pub fn handle(&mut self, event: &KeyEvent, effect: LockEffect, settings: &EffectSettings) {
        debug!(
            key_code = event.key_code,
            modifiers = ?event.modifiers,
            waited_us = event.timestamp.elapsed().as_micros() as u64,
            ?effect,
            "dispatching key event"
        );

        match effect {
            LockEffect::None => {}
            LockEffect::SpeakKey => self.speak_key(event, settings),
            LockEffect::SpeakWord => self.speak_word(settings.active_word_set_kind, settings),
            LockEffect::SpeakRandomWord => self.speak_word(WordSetKind::RandomWithName, settings),
            LockEffect::Animate => self.overlays.play_animation(),
        }
    }

    fn speak_key(&self, event: &KeyEvent, settings: &EffectSettings) {
        let Some(text) = event.spoken_text() else {
            return;
        };
        let voice = VoicePreference {
            personal: settings.personal_voice(),
            language: TranslationLanguage::None,
        };
        self.enqueue(text, voice);
    }

    fn speak_word(&mut self, kind: WordSetKind, settings: &EffectSettings) {
        let Some(word) = self.resolve(kind, settings.translation_language) else {
            return;
        };

        let voice = VoicePreference {
            personal: settings.personal_voice(),
            language: if word.translation.is_some() {
                settings.translation_language
            } else {
                TranslationLanguage::None
            },
        };
        self.enqueue(word.primary().to_string(), voice);
        self.overlays
            .show_word(word.primary(), word.secondary(), settings.display_duration());
    }

    /// Resolve a word; an empty set is reported once, then the built-in set stands in
    fn resolve(&mut self, kind: WordSetKind, language: TranslationLanguage) -> Option<ResolvedWord> {
        match self.resolver.next(kind, language) {
            Ok(word) => {
                self.empty_reported = false;
                Some(word)
            }
            Err(WordSetError::EmptyWordSet(empty)) => {
                if !self.empty_reported {
                    warn!(kind = %empty, "word set is empty, using built-in words");
                    let _ = self.event_tx.send(LockEvent::EmptyWordSet { kind: empty });
                    self.empty_reported = true;
                }
                self.resolver.next(WordSetKind::RandomShort, language).ok()
            }
        }
    }

    fn enqueue(&self, text: String, voice: VoicePreference) {
        match self.speech.enqueue(text, voice) {
            EnqueueOutcome::Queued => {}
            EnqueueOutcome::Dropped => debug!("speech backlog full, utterance dropped"),
            EnqueueOutcome::Rejected => debug!("speech queue closed, utterance rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::{codes, Modifiers};
    use crate::overlay::OverlayCommand;
    use crate::testing::{RecordingOverlay, ScriptedEngine};
    use crate::words::WordPair;

    struct Harness {
        dispatcher: EffectDispatcher,
        speech: SpeechQueue,
        overlay: Arc<RecordingOverlay>,
        events: broadcast::Receiver<LockEvent>,
        lock_tx: watch::Sender<LockState>,
        effect_tx: watch::Sender<LockEffect>,
        _settings_tx: watch::Sender<EffectSettings>,
    }

    fn harness(main_words: Vec<WordPair>, random_words: Vec<WordPair>) -> Harness {
        let resolver = Arc::new(WordSetResolver::seeded(main_words, random_words, 11));
        let speech = SpeechQueue::new(Arc::new(ScriptedEngine::immediate()), 3);
        let overlay = Arc::new(RecordingOverlay::default());
        let overlays = OverlaySession::new(overlay.clone());
        overlays.open();

        let (event_tx, events) = broadcast::channel(16);
        let (lock_tx, lock) = watch::channel(LockState {
            is_locked: true,
            permission_granted: true,
        });
        let (effect_tx, effect) = watch::channel(LockEffect::SpeakKey);
        let (settings_tx, settings) = watch::channel(EffectSettings::default());

        let dispatcher = EffectDispatcher::new(
            resolver,
            speech.clone(),
            overlays,
            DispatchInputs {
                lock,
                effect,
                settings,
            },
            event_tx,
        );

        Harness {
            dispatcher,
            speech,
            overlay,
            events,
            lock_tx,
            effect_tx,
            _settings_tx: settings_tx,
        }
    }

    fn key(code: u16) -> KeyEvent {
        KeyEvent::new(code, Modifiers::default())
    }

    #[tokio::test]
    async fn test_speak_key() {
        let mut h = harness(Vec::new(), Vec::new());
        h.dispatcher.handle(&key(0), LockEffect::SpeakKey, &EffectSettings::default());
        h.dispatcher.handle(&key(codes::SPACE), LockEffect::SpeakKey, &EffectSettings::default());

        assert_eq!(h.speech.pending(), vec!["a", "space"]);
        assert!(h.overlay.commands().is_empty());
    }

    #[tokio::test]
    async fn test_speak_word_with_translation() {
        let mut h = harness(vec![WordPair::new("cat", "Katze")], Vec::new());
        let settings = EffectSettings {
            translation_language: TranslationLanguage::German,
            active_word_set_kind: WordSetKind::MainWords,
            ..Default::default()
        };

        h.dispatcher.handle(&key(0), LockEffect::SpeakWord, &settings);

        assert_eq!(h.speech.pending(), vec!["Katze"]);
        assert_eq!(
            h.overlay.commands(),
            vec![OverlayCommand::ShowWord {
                text: "Katze".into(),
                secondary: Some("cat".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_speak_random_word_ignores_active_set() {
        let mut h = harness(
            vec![WordPair::new("cat", "")],
            vec![WordPair::new("{name}'s ball", "")],
        );
        let settings = EffectSettings {
            active_word_set_kind: WordSetKind::MainWords,
            ..Default::default()
        };

        h.dispatcher.handle(&key(0), LockEffect::SpeakRandomWord, &settings);
        assert_eq!(h.speech.pending(), vec!["ball"]);
    }

    #[tokio::test]
    async fn test_animate_and_none() {
        let mut h = harness(Vec::new(), Vec::new());

        h.dispatcher.handle(&key(0), LockEffect::None, &EffectSettings::default());
        assert!(h.overlay.commands().is_empty());

        h.dispatcher.handle(&key(0), LockEffect::Animate, &EffectSettings::default());
        assert_eq!(h.overlay.commands(), vec![OverlayCommand::ShowAnimation]);
        assert!(h.speech.pending().is_empty());
    }

    #[tokio::test]
    async fn test_empty_main_words_reported_once_then_builtin() {
        let mut h = harness(Vec::new(), Vec::new());
        let settings = EffectSettings {
            active_word_set_kind: WordSetKind::MainWords,
            ..Default::default()
        };

        h.dispatcher.handle(&key(0), LockEffect::SpeakWord, &settings);
        h.dispatcher.handle(&key(1), LockEffect::SpeakWord, &settings);

        assert_eq!(
            h.events.try_recv().unwrap(),
            LockEvent::EmptyWordSet {
                kind: WordSetKind::MainWords
            }
        );
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.speech.pending().len(), 2);
    }

    #[tokio::test]
    async fn test_run_discards_events_while_unlocked() {
        let h = harness(Vec::new(), Vec::new());
        let (key_tx, key_rx) = mpsc::channel(8);

        h.lock_tx.send_modify(|state| state.is_locked = false);
        key_tx.send(key(0)).await.unwrap();
        drop(key_tx);

        h.dispatcher.run(key_rx).await;
        assert!(h.speech.pending().is_empty());
    }

    #[tokio::test]
    async fn test_run_discards_events_after_permission_loss() {
        let h = harness(Vec::new(), Vec::new());
        let (key_tx, key_rx) = mpsc::channel(8);

        key_tx.send(key(0)).await.unwrap();
        h.lock_tx.send_modify(|state| state.permission_granted = false);
        drop(key_tx);

        h.dispatcher.run(key_rx).await;
        assert!(h.speech.pending().is_empty());
        assert!(h.overlay.commands().is_empty());
    }

    #[tokio::test]
    async fn test_run_dispatches_in_arrival_order() {
        let h = harness(Vec::new(), Vec::new());
        let (key_tx, key_rx) = mpsc::channel(8);

        h.effect_tx.send(LockEffect::SpeakKey).unwrap();
        for code in [0, 11, 8] {
            key_tx.send(key(code)).await.unwrap();
        }
        drop(key_tx);

        h.dispatcher.run(key_rx).await;
        assert_eq!(h.speech.pending(), vec!["a", "b", "c"]);
    }
}
