//! Single-concurrency FIFO speech playback
//!
//! One worker task plays utterances in order. The queue is bounded: once
//! `capacity` requests are waiting, new requests are dropped and counted.
//! `cancel_all` bumps a generation counter that aborts the in-flight
//! utterance and clears everything waiting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::engine::SpeechEngine;
use crate::words::TranslationLanguage;

/// Which voice an utterance should use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoicePreference {
    /// Personal voice name, when the user asked for it
    pub personal: Option<String>,
    /// Language of the text, used to pick a matching stock voice
    pub language: TranslationLanguage,
}

/// Result of an `enqueue` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The queue was full
    Dropped,
    /// The queue is closed because the lock is off
    Rejected,
}

struct Utterance {
    id: u64,
    text: String,
    voice: VoicePreference,
}

struct QueueState {
    pending: VecDeque<Utterance>,
    playing: Option<(u64, String)>,
    accepting: bool,
    next_id: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    generation: watch::Sender<u64>,
    engine: Arc<dyn SpeechEngine>,
    capacity: usize,
    dropped: AtomicU64,
}

/// Handle to the speech queue; clones share the same queue
#[derive(Clone)]
pub struct SpeechQueue {
    shared: Arc<Shared>,
}

impl SpeechQueue {
    pub fn new(engine: Arc<dyn SpeechEngine>, capacity: usize) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    playing: None,
                    accepting: true,
                    next_id: 0,
                }),
                wake: Notify::new(),
                generation,
                engine,
                capacity,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the playback worker
    pub fn spawn(&self) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }

    /// Queue text for playback after everything already queued
    pub fn enqueue(&self, text: impl Into<String>, voice: VoicePreference) -> EnqueueOutcome {
        let mut state = self.lock();

        if !state.accepting {
            return EnqueueOutcome::Rejected;
        }

        if state.pending.len() >= self.shared.capacity {
            let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(dropped, "speech queue full, dropping utterance");
            return EnqueueOutcome::Dropped;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.pending.push_back(Utterance {
            id,
            text: text.into(),
            voice,
        });
        drop(state);

        self.shared.wake.notify_one();
        EnqueueOutcome::Queued
    }

    /// Stop the current utterance and drain the queue
    pub fn cancel_all(&self) {
        let mut state = self.lock();
        let drained = state.pending.len();
        state.pending.clear();
        let interrupted = state.playing.take().is_some();
        self.shared.generation.send_modify(|generation| *generation += 1);
        drop(state);

        if drained > 0 || interrupted {
            debug!(drained, interrupted, "speech cancelled");
        }
    }

    /// Open or close the queue for new requests
    pub fn set_accepting(&self, accepting: bool) {
        self.lock().accepting = accepting;
    }

    #[cfg(test)]
    /// Texts waiting to be spoken, oldest first
    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.iter().map(|u| u.text.clone()).collect()
    }

    #[cfg(test)]
    /// Text currently being spoken
    pub fn playing(&self) -> Option<String> {
        self.lock().playing.as_ref().map(|(_, text)| text.clone())
    }

    /// Requests dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Pick the voice for an utterance; missing voices fall back silently
    fn resolve_voice<'a>(&self, preference: &'a VoicePreference) -> Option<&'a str> {
        let engine = &self.shared.engine;

        if let Some(personal) = preference.personal.as_deref() {
            if engine.has_voice(personal) {
                return Some(personal);
            }
            debug!(voice = personal, "personal voice unavailable, using default voice");
        }

        preference.language.voice().filter(|voice| engine.has_voice(voice))
    }

    async fn run(self) {
        let mut generation = self.shared.generation.subscribe();

        loop {
            let next = {
                let mut state = self.lock();
                let next = state.pending.pop_front();
                if let Some(utterance) = &next {
                    state.playing = Some((utterance.id, utterance.text.clone()));
                    // Seen under the state lock, so a later cancel is always observed
                    generation.borrow_and_update();
                }
                next
            };

            let Some(utterance) = next else {
                self.shared.wake.notified().await;
                continue;
            };

            let voice = self.resolve_voice(&utterance.voice);
            debug!(text = %utterance.text, ?voice, "speaking");

            tokio::select! {
                result = self.shared.engine.speak(&utterance.text, voice) => {
                    if let Err(e) = result {
                        warn!(%e, "speech failed");
                    }
                }
                _ = generation.changed() => {
                    debug!(text = %utterance.text, "utterance interrupted");
                }
            }

            let mut state = self.lock();
            if matches!(&state.playing, Some((id, _)) if *id == utterance.id) {
                state.playing = None;
            }
        }
    }
}
