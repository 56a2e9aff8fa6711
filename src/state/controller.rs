//! Lock state controller
//!
//! Sole owner of the lock state. Every change arrives as a `ControlCommand`
//! (IPC requests, permission flips, hook signals) and is applied in order.
//! The controller keeps the interceptor active exactly while the keyboard is
//! locked and permission is granted, and tears speech and overlays down on
//! every way out of a lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::effects::{DispatchInputs, EffectSettings, LockEffect};
use crate::events::{DegradedReason, LockEvent};
use crate::intercept::{HookSignal, HookState, InputInterceptor};
use crate::overlay::OverlaySession;
use crate::settings::{Settings, SettingsStore, SettingsUpdate, WordLists};
use crate::speech::SpeechQueue;
use crate::words::{WordPair, WordSet, WordSetKind, WordSetResolver};

/// Lock intent and the OS permission it depends on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub is_locked: bool,
    pub permission_granted: bool,
}

/// Full status snapshot for clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatus {
    pub is_locked: bool,
    pub permission_granted: bool,
    pub hook_state: HookState,
    pub effect: LockEffect,
    pub degraded: Option<DegradedReason>,
    pub keys_forwarded: u64,
    pub keys_dropped: u64,
    pub speech_dropped: u64,
    pub settings: Settings,
}

/// Requests handled by the controller loop
#[derive(Debug)]
pub enum ControlCommand {
    SetLocked(bool),
    SetEffect(LockEffect),
    UpdateSettings(SettingsUpdate),
    UpdateMainWords {
        words: Vec<WordPair>,
        reply: oneshot::Sender<usize>,
    },
    UpdateRandomWords {
        words: Vec<WordPair>,
        reply: oneshot::Sender<usize>,
    },
    GetWordSet {
        kind: WordSetKind,
        reply: oneshot::Sender<WordSet>,
    },
    Status(oneshot::Sender<LockStatus>),
    PermissionChanged(bool),
    Hook(HookSignal),
    Shutdown,
}

/// Collaborators the controller drives
pub struct ControllerParts {
    pub interceptor: InputInterceptor,
    pub speech: SpeechQueue,
    pub overlays: Arc<OverlaySession>,
    pub resolver: Arc<WordSetResolver>,
    pub store: SettingsStore,
    pub event_tx: broadcast::Sender<LockEvent>,
}

/// Owns the lock state and drives the interceptor, speech and overlays
pub struct LockStateController {
    interceptor: InputInterceptor,
    speech: SpeechQueue,
    overlays: Arc<OverlaySession>,
    resolver: Arc<WordSetResolver>,
    store: SettingsStore,
    settings: Settings,
    lock_tx: watch::Sender<LockState>,
    effect_tx: watch::Sender<LockEffect>,
    settings_tx: watch::Sender<EffectSettings>,
    event_tx: broadcast::Sender<LockEvent>,
    degraded: Option<DegradedReason>,
}

impl LockStateController {
    /// Create an unlocked controller without permission
    pub fn new(parts: ControllerParts, settings: Settings) -> Self {
        let (lock_tx, _) = watch::channel(LockState::default());
        let (effect_tx, _) = watch::channel(settings.lock_effect);
        let (settings_tx, _) = watch::channel(settings.effect_settings());

        // Nothing may be spoken until the hook is active
        parts.speech.set_accepting(false);

        Self {
            interceptor: parts.interceptor,
            speech: parts.speech,
            overlays: parts.overlays,
            resolver: parts.resolver,
            store: parts.store,
            settings,
            lock_tx,
            effect_tx,
            settings_tx,
            event_tx: parts.event_tx,
            degraded: None,
        }
    }

    /// Receivers for the effect dispatcher
    pub fn dispatch_inputs(&self) -> DispatchInputs {
        DispatchInputs {
            lock: self.lock_tx.subscribe(),
            effect: self.effect_tx.subscribe(),
            settings: self.settings_tx.subscribe(),
        }
    }

    pub fn state(&self) -> LockState {
        *self.lock_tx.borrow()
    }

    pub fn effect(&self) -> LockEffect {
        *self.effect_tx.borrow()
    }

    pub fn hook_state(&self) -> HookState {
        self.interceptor.state()
    }

    pub fn degraded(&self) -> Option<&DegradedReason> {
        self.degraded.as_ref()
    }

    pub fn status(&self) -> LockStatus {
        let state = self.state();
        LockStatus {
            is_locked: state.is_locked,
            permission_granted: state.permission_granted,
            hook_state: self.interceptor.state(),
            effect: self.effect(),
            degraded: self.degraded.clone(),
            keys_forwarded: self.interceptor.filter().forwarded(),
            keys_dropped: self.interceptor.filter().dropped(),
            speech_dropped: self.speech.dropped(),
            settings: self.settings.clone(),
        }
    }

    fn emit(&self, event: LockEvent) {
        debug!(%event, "lock event");
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    /// Run the controller, processing commands until shutdown
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<ControlCommand>) {
        info!("lock controller started");

        while let Some(command) = command_rx.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        self.shutdown();
        info!("lock controller stopped");
    }

    /// Apply one command; returns false once the controller should stop
    pub fn handle(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::SetLocked(locked) => self.set_locked(locked),
            ControlCommand::SetEffect(effect) => self.set_effect(effect),
            ControlCommand::UpdateSettings(update) => self.update_settings(update),
            ControlCommand::UpdateMainWords { words, reply } => {
                let _ = reply.send(self.update_main_words(words));
            }
            ControlCommand::UpdateRandomWords { words, reply } => {
                let _ = reply.send(self.update_random_words(words));
            }
            ControlCommand::GetWordSet { kind, reply } => {
                let _ = reply.send(self.resolver.current_word_set(kind));
            }
            ControlCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ControlCommand::PermissionChanged(granted) => self.on_permission_changed(granted),
            ControlCommand::Hook(signal) => self.on_hook_signal(signal),
            ControlCommand::Shutdown => return false,
        }
        true
    }

    /// Lock or unlock the keyboard
    pub fn set_locked(&mut self, locked: bool) {
        if self.state().is_locked == locked {
            return;
        }

        self.lock_tx.send_modify(|state| state.is_locked = locked);

        if locked {
            info!("keyboard locked");
            self.emit(LockEvent::Locked);
            self.activate();
        } else {
            info!("keyboard unlocked");
            self.release();
            self.emit(LockEvent::Unlocked);
        }
    }

    /// Start the hook if permission allows, otherwise report why not
    ///
    /// Speech and overlays only accept requests while the hook is active.
    fn activate(&mut self) {
        if !self.state().permission_granted {
            warn!("lock requested without accessibility permission, waiting for grant");
            self.set_degraded(DegradedReason::PermissionDenied);
            return;
        }

        match self.interceptor.start() {
            Ok(()) => {
                self.speech.set_accepting(true);
                self.overlays.open();
                self.degraded = None;
                self.emit(LockEvent::HookStateChanged {
                    state: HookState::Active,
                });
            }
            Err(e) => {
                error!(%e, "lock is on but input is not intercepted");
                self.set_degraded(DegradedReason::HookInstallFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    fn set_degraded(&mut self, reason: DegradedReason) {
        self.degraded = Some(reason.clone());
        self.emit(LockEvent::Degraded { reason });
    }

    fn stop_hook(&mut self) {
        let was_running = self.interceptor.state() != HookState::Stopped;
        self.interceptor.stop();
        if was_running {
            self.emit(LockEvent::HookStateChanged {
                state: HookState::Stopped,
            });
        }
    }

    // Each step runs regardless of the others
    fn release(&mut self) {
        self.stop_hook();
        self.speech.set_accepting(false);
        self.speech.cancel_all();
        self.overlays.close();
        self.degraded = None;
    }

    /// React to the OS granting or revoking accessibility access
    pub fn on_permission_changed(&mut self, granted: bool) {
        if self.state().permission_granted == granted {
            return;
        }

        info!(granted, "permission changed");
        self.lock_tx
            .send_modify(|state| state.permission_granted = granted);
        self.emit(LockEvent::PermissionChanged { granted });

        let locked = self.state().is_locked;

        if granted {
            if locked {
                self.activate();
            }
            return;
        }

        // Pass input through first so nothing stays swallowed during teardown
        self.interceptor.disengage();
        self.speech.set_accepting(false);
        self.speech.cancel_all();
        self.overlays.close();
        self.stop_hook();

        if locked {
            self.set_degraded(DegradedReason::PermissionDenied);
        }
    }

    fn on_hook_signal(&mut self, signal: HookSignal) {
        match signal {
            HookSignal::UnlockRequested => {
                if self.state().is_locked {
                    info!("unlock shortcut pressed");
                    self.set_locked(false);
                }
            }
            HookSignal::TapDisabled => {
                warn!("event tap was disabled by the system and re-enabled");
            }
        }
    }

    // Anything playing or on screen belongs to the old effect
    fn interrupt_feedback(&self) {
        if self.state().is_locked {
            self.speech.cancel_all();
            self.overlays.clear();
        }
    }

    /// Select the feedback effect
    pub fn set_effect(&mut self, effect: LockEffect) {
        if self.effect() == effect {
            return;
        }

        info!(?effect, "lock effect changed");
        self.interrupt_feedback();
        self.effect_tx.send_replace(effect);
        self.settings.lock_effect = effect;
        self.persist_settings();
        self.emit(LockEvent::EffectChanged { effect });
    }

    /// Apply a partial settings change
    pub fn update_settings(&mut self, update: SettingsUpdate) {
        let previous_name = self.settings.baby_name.clone();
        if !self.settings.apply(update) {
            return;
        }

        if self.settings.baby_name != previous_name {
            self.resolver.set_baby_name(self.settings.baby_name.clone());
        }

        info!("settings updated");
        self.interrupt_feedback();
        self.settings_tx.send_replace(self.settings.effect_settings());
        self.persist_settings();
        self.emit(LockEvent::SettingsChanged);
    }

    pub fn update_main_words(&mut self, words: Vec<WordPair>) -> usize {
        let kept = self.resolver.update_main_words(words);
        info!(kept, "main words updated");
        self.persist_words();
        kept
    }

    pub fn update_random_words(&mut self, words: Vec<WordPair>) -> usize {
        let kept = self.resolver.update_random_words(words);
        info!(kept, "random words updated");
        self.persist_words();
        kept
    }

    fn persist_settings(&self) {
        if let Err(e) = self.store.save_settings(&self.settings) {
            warn!(%e, "failed to save settings");
        }
    }

    fn persist_words(&self) {
        let words = WordLists {
            main_words: self.resolver.current_word_set(WordSetKind::MainWords).words,
            random_words: self
                .resolver
                .current_word_set(WordSetKind::RandomWithName)
                .words,
        };
        if let Err(e) = self.store.save_words(&words) {
            warn!(%e, "failed to save word lists");
        }
    }

    /// Force the keyboard open and release the hook
    pub fn shutdown(&mut self) {
        if self.state().is_locked {
            self.set_locked(false);
        } else {
            self.release();
        }
    }
}
