//! Events published by the lock controller
//!
//! Subscribed IPC clients receive these as push notifications: lock
//! transitions (the UI plays its switch sound on them), permission and hook
//! changes, degraded-state reports and overlay commands.

use serde::{Deserialize, Serialize};

use crate::effects::LockEffect;
use crate::intercept::HookState;
use crate::overlay::OverlayCommand;
use crate::words::WordSetKind;

/// Why a lock request is not taking effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradedReason {
    /// Accessibility access has not been granted
    PermissionDenied,
    /// The input hook could not be installed
    HookInstallFailed { message: String },
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradedReason::PermissionDenied => write!(f, "accessibility permission not granted"),
            DegradedReason::HookInstallFailed { message } => {
                write!(f, "input hook installation failed: {}", message)
            }
        }
    }
}

/// Events emitted by the controller and the effect pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockEvent {
    /// Lock switched on
    Locked,

    /// Lock switched off
    Unlocked,

    /// The OS-reported permission flipped
    PermissionChanged { granted: bool },

    /// The input hook moved to a new lifecycle state
    HookStateChanged { state: HookState },

    /// The lock is on but inert
    Degraded { reason: DegradedReason },

    /// The feedback effect changed
    EffectChanged { effect: LockEffect },

    /// Settings other than the effect changed
    SettingsChanged,

    /// A word set had nothing to say; the UI should prompt for words
    EmptyWordSet { kind: WordSetKind },

    /// Request for the overlay window coordinator
    Overlay { command: OverlayCommand },
}

impl std::fmt::Display for LockEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockEvent::Locked => write!(f, "LOCKED"),
            LockEvent::Unlocked => write!(f, "UNLOCKED"),
            LockEvent::PermissionChanged { granted } => {
                write!(f, "PERMISSION_CHANGED (granted={})", granted)
            }
            LockEvent::HookStateChanged { state } => write!(f, "HOOK_STATE_CHANGED ({})", state),
            LockEvent::Degraded { reason } => write!(f, "DEGRADED ({})", reason),
            LockEvent::EffectChanged { effect } => write!(f, "EFFECT_CHANGED ({:?})", effect),
            LockEvent::SettingsChanged => write!(f, "SETTINGS_CHANGED"),
            LockEvent::EmptyWordSet { kind } => write!(f, "EMPTY_WORD_SET ({})", kind),
            LockEvent::Overlay { command } => write!(f, "OVERLAY ({:?})", command),
        }
    }
}
