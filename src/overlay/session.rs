//! Overlay visibility for one lock session
//!
//! Tracks what is on screen, owns the word-display auto-hide timer and
//! refuses new overlays once the session is closed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use super::{OverlayCoordinator, OverlayError};

#[derive(Default)]
struct SessionState {
    open: bool,
    word_visible: bool,
    animation_visible: bool,
    hide_timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl SessionState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.hide_timer.take() {
            timer.abort();
        }
    }
}

fn report(action: &str, result: Result<(), OverlayError>) {
    if let Err(e) = result {
        warn!(action, %e, "overlay request failed");
    }
}

/// Overlay state shared by the dispatcher and the lock controller
pub struct OverlaySession {
    coordinator: Arc<dyn OverlayCoordinator>,
    state: Mutex<SessionState>,
}

impl OverlaySession {
    pub fn new(coordinator: Arc<dyn OverlayCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            state: Mutex::new(SessionState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allow overlays to be shown
    pub fn open(&self) {
        self.lock().open = true;
    }

    /// Show a word, replacing any word on screen and restarting the hide timer
    pub fn show_word(self: &Arc<Self>, text: &str, secondary: Option<&str>, duration: Duration) {
        let mut state = self.lock();
        if !state.open {
            return;
        }

        state.cancel_timer();
        state.generation += 1;
        let generation = state.generation;

        report("show_word", self.coordinator.show_word_overlay(text, secondary));
        state.word_visible = true;

        let session = Arc::clone(self);
        state.hide_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            session.expire_word(generation);
        }));
    }

    fn expire_word(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || !state.word_visible {
            return;
        }
        report("hide_word", self.coordinator.hide_word_overlay());
        state.word_visible = false;
        state.hide_timer = None;
    }

    /// Play the animation overlay
    pub fn play_animation(&self) {
        let mut state = self.lock();
        if !state.open {
            return;
        }
        report("show_animation", self.coordinator.show_animation_overlay());
        state.animation_visible = true;
    }

    /// Hide every overlay but keep the session open
    pub fn clear(&self) {
        let mut state = self.lock();
        Self::hide_all(&self.coordinator, &mut state);
    }

    /// Hide every overlay and refuse new ones until reopened
    pub fn close(&self) {
        let mut state = self.lock();
        state.open = false;
        Self::hide_all(&self.coordinator, &mut state);
    }

    // Each hide is attempted even when the other fails
    fn hide_all(coordinator: &Arc<dyn OverlayCoordinator>, state: &mut SessionState) {
        state.cancel_timer();
        state.generation += 1;
        report("hide_word", coordinator.hide_word_overlay());
        report("hide_animation", coordinator.hide_animation_overlay());
        state.word_visible = false;
        state.animation_visible = false;
    }

    #[cfg(test)]
    pub fn word_visible(&self) -> bool {
        self.lock().word_visible
    }

    #[cfg(test)]
    pub fn animation_visible(&self) -> bool {
        self.lock().animation_visible
    }
}
