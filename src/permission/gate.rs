//! Tracks the accessibility grant and publishes its flips

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::probe::PermissionProbe;

/// Tracks the accessibility grant and notifies subscribers when it flips
pub struct PermissionGate {
    probe: Arc<dyn PermissionProbe>,
    granted_tx: watch::Sender<bool>,
}

impl PermissionGate {
    /// Starts out denied until the first `refresh`
    pub fn new(probe: Arc<dyn PermissionProbe>) -> Self {
        let (granted_tx, _) = watch::channel(false);
        Self { probe, granted_tx }
    }

    /// Query the OS now; probe failures count as denied
    pub fn check_granted(&self) -> bool {
        match self.probe.check() {
            Ok(granted) => granted,
            Err(e) => {
                debug!(%e, "permission check failed, treating as denied");
                false
            }
        }
    }

    #[cfg(test)]
    /// Last published grant state
    pub fn is_granted(&self) -> bool {
        *self.granted_tx.borrow()
    }

    /// Receive every change of the grant state
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.granted_tx.subscribe()
    }

    /// Ask the OS to show its grant dialog
    pub fn prompt(&self) {
        self.probe.prompt();
    }

    /// Query the OS and publish the result if it changed
    pub fn refresh(&self) -> bool {
        let granted = self.check_granted();
        let changed = self.granted_tx.send_if_modified(|current| {
            if *current == granted {
                false
            } else {
                *current = granted;
                true
            }
        });

        if changed {
            info!(granted, "accessibility permission changed");
        }
        granted
    }

    /// Poll the OS until the task is dropped
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.refresh();
        }
    }
}
