//! Per-event suppress-or-pass decision
//!
//! `EventFilter::decide` runs inside the OS tap callback. It only touches
//! atomics and `try_send`, so it never blocks or waits on the pipeline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::keys::{KeyEvent, Modifiers, UnlockShortcut};

/// Coarse classification of a raw input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    KeyDown,
    KeyUp,
    FlagsChanged,
    Mouse,
}

/// The fields of an OS event the filter needs
#[derive(Debug, Clone, Copy)]
pub struct RawInput {
    pub kind: InputKind,
    pub key_code: u16,
    pub modifiers: Modifiers,
}

/// What the tap should do with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Suppress,
}

/// Out-of-band signals raised from the capture context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSignal {
    /// The unlock shortcut was pressed
    UnlockRequested,
    /// macOS disabled the tap (callback timeout or user input)
    TapDisabled,
}

/// Suppression policy shared between the tap thread and the controller
pub struct EventFilter {
    engaged: AtomicBool,
    block_mouse: bool,
    unlock: UnlockShortcut,
    key_tx: mpsc::Sender<KeyEvent>,
    signal_tx: mpsc::Sender<HookSignal>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl EventFilter {
    pub fn new(
        key_tx: mpsc::Sender<KeyEvent>,
        signal_tx: mpsc::Sender<HookSignal>,
        unlock: UnlockShortcut,
        block_mouse: bool,
    ) -> Self {
        Self {
            engaged: AtomicBool::new(false),
            block_mouse,
            unlock,
            key_tx,
            signal_tx,
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Start suppressing ordinary input
    pub fn engage(&self) {
        self.engaged.store(true, Ordering::SeqCst);
    }

    /// Fall back to passing everything through
    pub fn disengage(&self) {
        self.engaged.store(false, Ordering::SeqCst);
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    pub fn blocks_mouse(&self) -> bool {
        self.block_mouse
    }

    /// Key events handed to the dispatcher so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Key events lost because the handoff buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Classify one event and decide its fate
    pub fn decide(&self, input: RawInput) -> Verdict {
        if input.kind == InputKind::KeyDown && self.unlock.matches(input.key_code, input.modifiers) {
            let _ = self.signal_tx.try_send(HookSignal::UnlockRequested);
            return Verdict::Pass;
        }

        if !self.engaged.load(Ordering::Acquire) {
            return Verdict::Pass;
        }

        match input.kind {
            InputKind::KeyDown => {
                let event = KeyEvent::new(input.key_code, input.modifiers);
                match self.key_tx.try_send(event) {
                    Ok(()) => {
                        self.forwarded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Verdict::Suppress
            }
            InputKind::KeyUp | InputKind::FlagsChanged => Verdict::Suppress,
            InputKind::Mouse if self.block_mouse => Verdict::Suppress,
            InputKind::Mouse => Verdict::Pass,
        }
    }

    /// Report that the OS turned the tap off
    pub fn tap_disabled(&self) {
        let _ = self.signal_tx.try_send(HookSignal::TapDisabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::keys::{codes, Modifier};

    fn filter(
        capacity: usize,
        block_mouse: bool,
    ) -> (EventFilter, mpsc::Receiver<KeyEvent>, mpsc::Receiver<HookSignal>) {
        let (key_tx, key_rx) = mpsc::channel(capacity);
        let (signal_tx, signal_rx) = mpsc::channel(4);
        (
            EventFilter::new(key_tx, signal_tx, UnlockShortcut::default(), block_mouse),
            key_rx,
            signal_rx,
        )
    }

    fn key_down(key_code: u16) -> RawInput {
        RawInput {
            kind: InputKind::KeyDown,
            key_code,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn test_disengaged_passes_everything() {
        let (filter, mut key_rx, _) = filter(4, true);
        assert_eq!(filter.decide(key_down(0)), Verdict::Pass);
        assert!(key_rx.try_recv().is_err());
    }

    #[test]
    fn test_engaged_suppresses_and_forwards_key_down() {
        let (filter, mut key_rx, _) = filter(4, false);
        filter.engage();

        assert_eq!(filter.decide(key_down(0)), Verdict::Suppress);
        let event = key_rx.try_recv().unwrap();
        assert_eq!(event.key_code, 0);
        assert_eq!(event.character, Some('a'));

        let key_up = RawInput {
            kind: InputKind::KeyUp,
            ..key_down(0)
        };
        assert_eq!(filter.decide(key_up), Verdict::Suppress);
        assert!(key_rx.try_recv().is_err());
        assert_eq!(filter.forwarded(), 1);
    }

    #[test]
    fn test_mouse_policy() {
        let mouse = RawInput {
            kind: InputKind::Mouse,
            ..key_down(0)
        };

        let (passing, _, _) = filter(4, false);
        passing.engage();
        assert_eq!(passing.decide(mouse), Verdict::Pass);

        let (blocking, _, _) = filter(4, true);
        blocking.engage();
        assert_eq!(blocking.decide(mouse), Verdict::Suppress);
    }

    #[test]
    fn test_unlock_shortcut_passes_and_signals() {
        let (filter, mut key_rx, mut signal_rx) = filter(4, false);
        filter.engage();

        let chord = RawInput {
            kind: InputKind::KeyDown,
            key_code: codes::U,
            modifiers: Modifiers::of(&[Modifier::Control, Modifier::Option]),
        };
        assert_eq!(filter.decide(chord), Verdict::Pass);
        assert_eq!(signal_rx.try_recv().unwrap(), HookSignal::UnlockRequested);
        assert!(key_rx.try_recv().is_err());
    }

    #[test]
    fn test_full_handoff_counts_drops_without_blocking() {
        let (filter, _key_rx, _) = filter(2, false);
        filter.engage();

        for _ in 0..5 {
            assert_eq!(filter.decide(key_down(1)), Verdict::Suppress);
        }
        assert_eq!(filter.forwarded(), 2);
        assert_eq!(filter.dropped(), 3);
    }
}
