//! Wires the lock pipeline together
//!
//! `App::start` builds every component, applies the launch-time permission
//! check and lock-on-launch, and spawns the long-running tasks. `App::stop`
//! force-unlocks, which releases the hook and silences speech, then tears the
//! tasks down.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::effects::EffectDispatcher;
use crate::events::LockEvent;
use crate::intercept::{EventFilter, HookBackend, HookSignal, InputInterceptor, UnlockShortcut};
use crate::overlay::{OverlayCoordinator, OverlaySession};
use crate::permission::{PermissionGate, PermissionProbe};
use crate::settings::SettingsStore;
use crate::speech::{SpeechEngine, SpeechQueue};
use crate::state::{ControlCommand, ControllerParts, LockStateController};
use crate::words::WordSetResolver;

const CONTROL_BUFFER: usize = 32;
const SIGNAL_BUFFER: usize = 16;

/// Platform services the daemon runs on
pub struct AppDeps {
    pub backend: Arc<dyn HookBackend>,
    pub probe: Arc<dyn PermissionProbe>,
    pub engine: Arc<dyn SpeechEngine>,
    pub overlay: Arc<dyn OverlayCoordinator>,
}

/// The running daemon core
pub struct App {
    control_tx: mpsc::Sender<ControlCommand>,
    controller_task: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Build and start every component; must be called inside a tokio runtime
    pub fn start(
        config: &Config,
        store: SettingsStore,
        deps: AppDeps,
        event_tx: broadcast::Sender<LockEvent>,
    ) -> Self {
        let settings = store.load_settings();
        let words = store.load_words();
        info!(
            effect = ?settings.lock_effect,
            main_words = words.main_words.len(),
            random_words = words.random_words.len(),
            "settings loaded"
        );

        let resolver = Arc::new(WordSetResolver::new(
            words.main_words,
            words.random_words,
            settings.baby_name.clone(),
        ));

        let (key_tx, key_rx) = mpsc::channel(config.key_buffer);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        let filter = Arc::new(EventFilter::new(
            key_tx,
            signal_tx,
            UnlockShortcut::default(),
            config.block_mouse,
        ));

        let speech = SpeechQueue::new(deps.engine, config.speech_queue_depth);
        let overlays = OverlaySession::new(deps.overlay);

        let mut controller = LockStateController::new(
            ControllerParts {
                interceptor: InputInterceptor::new(deps.backend, filter),
                speech: speech.clone(),
                overlays: Arc::clone(&overlays),
                resolver: Arc::clone(&resolver),
                store,
                event_tx: event_tx.clone(),
            },
            settings.clone(),
        );

        let gate = Arc::new(PermissionGate::new(deps.probe));
        let granted = gate.refresh();
        if !granted {
            warn!("accessibility permission not granted, asking the system to prompt");
            gate.prompt();
        }
        controller.on_permission_changed(granted);

        if settings.lock_keyboard_on_launch {
            info!("locking keyboard on launch");
            controller.set_locked(true);
        }

        let dispatcher = EffectDispatcher::new(
            resolver,
            speech.clone(),
            overlays,
            controller.dispatch_inputs(),
            event_tx,
        );

        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);

        let tasks = vec![
            speech.spawn(),
            tokio::spawn(dispatcher.run(key_rx)),
            tokio::spawn(Arc::clone(&gate).run(config.permission_poll)),
            tokio::spawn(forward_permission(gate.subscribe(), control_tx.clone())),
            tokio::spawn(forward_hook_signals(signal_rx, control_tx.clone())),
        ];
        let controller_task = tokio::spawn(controller.run(control_rx));

        info!("lock pipeline started");

        Self {
            control_tx,
            controller_task,
            tasks,
        }
    }

    /// Channel for IPC requests to the controller
    pub fn control(&self) -> mpsc::Sender<ControlCommand> {
        self.control_tx.clone()
    }

    /// Force-unlock and stop every task
    pub async fn stop(self) {
        info!("stopping lock pipeline");

        if self.control_tx.send(ControlCommand::Shutdown).await.is_err() {
            debug!("controller already stopped");
        }
        if let Err(e) = self.controller_task.await {
            warn!(?e, "controller task failed");
        }

        for task in self.tasks {
            task.abort();
        }

        info!("lock pipeline stopped");
    }
}

/// Turn grant flips into controller commands
async fn forward_permission(
    mut granted_rx: watch::Receiver<bool>,
    control_tx: mpsc::Sender<ControlCommand>,
) {
    while granted_rx.changed().await.is_ok() {
        let granted = *granted_rx.borrow_and_update();
        if control_tx
            .send(ControlCommand::PermissionChanged(granted))
            .await
            .is_err()
        {
            break;
        }
    }
}

async fn forward_hook_signals(
    mut signal_rx: mpsc::Receiver<HookSignal>,
    control_tx: mpsc::Sender<ControlCommand>,
) {
    while let Some(signal) = signal_rx.recv().await {
        if control_tx.send(ControlCommand::Hook(signal)).await.is_err() {
            break;
        }
    }
}
