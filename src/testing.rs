//! Test doubles shared by the unit tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::intercept::{
    EventFilter, HookBackend, HookError, HookHandle, HookSignal, KeyEvent, RawInput,
    UnlockShortcut, Verdict,
};
use crate::overlay::{OverlayCommand, OverlayCoordinator, OverlayError};
use crate::permission::{PermissionError, PermissionProbe};
use crate::speech::{SpeechEngine, SpeechError};

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

/// Filter with the default unlock shortcut and no mouse blocking
pub fn test_filter(
    capacity: usize,
) -> (
    Arc<EventFilter>,
    mpsc::Receiver<KeyEvent>,
    mpsc::Receiver<HookSignal>,
) {
    let (key_tx, key_rx) = mpsc::channel(capacity);
    let (signal_tx, signal_rx) = mpsc::channel(8);
    let filter = EventFilter::new(key_tx, signal_tx, UnlockShortcut::default(), false);
    (Arc::new(filter), key_rx, signal_rx)
}

#[derive(Default)]
struct MockHook {
    installed: AtomicBool,
    installs: AtomicUsize,
    filter: Mutex<Option<Arc<EventFilter>>>,
}

/// Hook backend that records installs and lets tests inject input
#[derive(Default)]
pub struct MockBackend {
    hook: Arc<MockHook>,
    fail: bool,
}

impl MockBackend {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn is_installed(&self) -> bool {
        self.hook.installed.load(Ordering::SeqCst)
    }

    /// Install attempts, failed ones included
    pub fn install_count(&self) -> usize {
        self.hook.installs.load(Ordering::SeqCst)
    }

    /// Deliver an OS event; `None` when no hook is installed
    pub fn inject(&self, input: RawInput) -> Option<Verdict> {
        let filter = self.hook.filter.lock().unwrap().clone();
        filter.map(|filter| filter.decide(input))
    }
}

struct MockHandle {
    hook: Arc<MockHook>,
}

impl HookHandle for MockHandle {
    fn remove(self: Box<Self>) {
        self.hook.installed.store(false, Ordering::SeqCst);
        self.hook.filter.lock().unwrap().take();
    }
}

impl HookBackend for MockBackend {
    fn install(&self, filter: Arc<EventFilter>) -> Result<Box<dyn HookHandle>, HookError> {
        self.hook.installs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(HookError::EventTapCreation);
        }
        self.hook.installed.store(true, Ordering::SeqCst);
        *self.hook.filter.lock().unwrap() = Some(filter);
        Ok(Box::new(MockHandle {
            hook: Arc::clone(&self.hook),
        }))
    }
}

#[derive(Default)]
struct Playback {
    started: Vec<String>,
    finished: Vec<String>,
    voices: Vec<Option<String>>,
    active: usize,
    max_active: usize,
    interrupted: usize,
}

/// Speech engine that records utterances; gated engines block until released
pub struct ScriptedEngine {
    gated: bool,
    voices: HashSet<String>,
    release: watch::Sender<bool>,
    playback: Mutex<Playback>,
}

impl ScriptedEngine {
    fn build(gated: bool) -> Self {
        let (release, _) = watch::channel(false);
        Self {
            gated,
            voices: HashSet::new(),
            release,
            playback: Mutex::new(Playback::default()),
        }
    }

    pub fn immediate() -> Self {
        Self::build(false)
    }

    pub fn gated() -> Self {
        Self::build(true)
    }

    pub fn with_voices(mut self, voices: &[&str]) -> Self {
        self.voices = voices.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.playback.lock().unwrap().started.clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.playback.lock().unwrap().finished.clone()
    }

    pub fn voices_used(&self) -> Vec<Option<String>> {
        self.playback.lock().unwrap().voices.clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.playback.lock().unwrap().max_active
    }

    pub fn interrupted(&self) -> usize {
        self.playback.lock().unwrap().interrupted
    }

    pub async fn wait_started(&self, count: usize) {
        wait_until(|| self.playback.lock().unwrap().started.len() >= count).await;
    }

    /// Let every gated utterance, current and future, finish
    pub fn release_all(&self) {
        self.release.send_replace(true);
    }
}

struct ActiveUtterance<'a> {
    engine: &'a ScriptedEngine,
    completed: bool,
}

impl Drop for ActiveUtterance<'_> {
    fn drop(&mut self) {
        let mut playback = self.engine.playback.lock().unwrap();
        playback.active -= 1;
        if !self.completed {
            playback.interrupted += 1;
        }
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<(), SpeechError> {
        {
            let mut playback = self.playback.lock().unwrap();
            playback.started.push(text.to_string());
            playback.voices.push(voice.map(str::to_owned));
            playback.active += 1;
            playback.max_active = playback.max_active.max(playback.active);
        }
        let mut utterance = ActiveUtterance {
            engine: self,
            completed: false,
        };

        if self.gated {
            let mut release = self.release.subscribe();
            let _ = release.wait_for(|released| *released).await;
        } else {
            tokio::task::yield_now().await;
        }

        utterance.completed = true;
        self.playback.lock().unwrap().finished.push(text.to_string());
        Ok(())
    }

    fn has_voice(&self, voice: &str) -> bool {
        self.voices.contains(voice)
    }
}

/// Overlay coordinator that records every request
#[derive(Default)]
pub struct RecordingOverlay {
    commands: Mutex<Vec<OverlayCommand>>,
    fail: bool,
}

impl RecordingOverlay {
    /// Records requests, then reports each as failed
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<OverlayCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: OverlayCommand) -> Result<(), OverlayError> {
        self.commands.lock().unwrap().push(command);
        if self.fail {
            Err(OverlayError::Unavailable("window server gone".into()))
        } else {
            Ok(())
        }
    }
}

impl OverlayCoordinator for RecordingOverlay {
    fn show_animation_overlay(&self) -> Result<(), OverlayError> {
        self.record(OverlayCommand::ShowAnimation)
    }

    fn hide_animation_overlay(&self) -> Result<(), OverlayError> {
        self.record(OverlayCommand::HideAnimation)
    }

    fn show_word_overlay(&self, text: &str, secondary: Option<&str>) -> Result<(), OverlayError> {
        self.record(OverlayCommand::ShowWord {
            text: text.to_string(),
            secondary: secondary.map(str::to_owned),
        })
    }

    fn hide_word_overlay(&self) -> Result<(), OverlayError> {
        self.record(OverlayCommand::HideWord)
    }
}

/// Permission probe the test flips by hand
pub struct MockProbe {
    granted: AtomicBool,
    failing: AtomicBool,
}

impl MockProbe {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set(&self, granted: bool) {
        self.failing.store(false, Ordering::SeqCst);
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl PermissionProbe for MockProbe {
    fn check(&self) -> Result<bool, PermissionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PermissionError::Unsupported);
        }
        Ok(self.granted.load(Ordering::SeqCst))
    }
}
