//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::effects::LockEffect;
use crate::events::LockEvent;
use crate::settings::SettingsUpdate;
use crate::state::LockStatus;
use crate::words::{WordPair, WordSet, WordSetKind};

/// Requests from UI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Lock or unlock the keyboard
    SetLocked { locked: bool },

    /// Select the feedback effect
    SetEffect { effect: LockEffect },

    /// Change some settings
    UpdateSettings { update: SettingsUpdate },

    /// Fetch a word set for the editor
    GetWordSet { kind: WordSetKind },

    /// Replace the main word list
    UpdateMainWords { words: Vec<WordPair> },

    /// Replace the random word list
    UpdateRandomWords { words: Vec<WordPair> },

    /// Subscribe to lock and overlay notifications
    Subscribe,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Requested word set
    WordSet(WordSet),

    /// Word list replaced; how many words were kept
    WordsUpdated { count: usize },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: LockEvent },

    /// Events were dropped because the client read too slowly
    Lagged { skipped: u64 },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    #[serde(flatten)]
    pub lock: LockStatus,
}
