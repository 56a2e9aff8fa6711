//! Overlay window coordination
//!
//! The daemon does not render anything itself. Overlay requests go to an
//! `OverlayCoordinator`; the default one publishes them to subscribed IPC
//! clients, which own the actual windows.

mod session;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::LockEvent;

pub use session::OverlaySession;

/// A request for the window coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OverlayCommand {
    ShowAnimation,
    HideAnimation,
    ShowWord {
        text: String,
        secondary: Option<String>,
    },
    HideWord,
}

/// Errors reported by an overlay coordinator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("overlay coordinator unavailable: {0}")]
    Unavailable(String),
}

/// Owner of the overlay windows
pub trait OverlayCoordinator: Send + Sync {
    fn show_animation_overlay(&self) -> Result<(), OverlayError>;
    fn hide_animation_overlay(&self) -> Result<(), OverlayError>;
    fn show_word_overlay(&self, text: &str, secondary: Option<&str>) -> Result<(), OverlayError>;
    fn hide_word_overlay(&self) -> Result<(), OverlayError>;
}

/// Publishes overlay commands as lock events
pub struct BroadcastOverlay {
    event_tx: broadcast::Sender<LockEvent>,
}

impl BroadcastOverlay {
    pub fn new(event_tx: broadcast::Sender<LockEvent>) -> Self {
        Self { event_tx }
    }

    fn publish(&self, command: OverlayCommand) -> Result<(), OverlayError> {
        // No subscriber means no window to drive
        if self.event_tx.send(LockEvent::Overlay { command }).is_err() {
            debug!("no overlay subscribers");
        }
        Ok(())
    }
}

impl OverlayCoordinator for BroadcastOverlay {
    fn show_animation_overlay(&self) -> Result<(), OverlayError> {
        self.publish(OverlayCommand::ShowAnimation)
    }

    fn hide_animation_overlay(&self) -> Result<(), OverlayError> {
        self.publish(OverlayCommand::HideAnimation)
    }

    fn show_word_overlay(&self, text: &str, secondary: Option<&str>) -> Result<(), OverlayError> {
        self.publish(OverlayCommand::ShowWord {
            text: text.to_string(),
            secondary: secondary.map(str::to_owned),
        })
    }

    fn hide_word_overlay(&self) -> Result<(), OverlayError> {
        self.publish(OverlayCommand::HideWord)
    }
}
