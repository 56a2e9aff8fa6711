//! Hook lifecycle around a platform backend
//!
//! The interceptor owns the installed hook and walks it through
//! `Stopped -> Starting -> Active -> Stopping -> Stopped`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::filter::EventFilter;

/// Lifecycle of the system-wide hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    #[default]
    Stopped,
    Starting,
    Active,
    Stopping,
}

impl std::fmt::Display for HookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookState::Stopped => write!(f, "Stopped"),
            HookState::Starting => write!(f, "Starting"),
            HookState::Active => write!(f, "Active"),
            HookState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Errors that can occur while installing the hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for the event tap")]
    RunLoopSource,

    #[error("failed to spawn tap thread: {0}")]
    ThreadSpawn(String),

    #[error("tap thread exited before reporting readiness")]
    TapThreadExited,

    #[error("system-wide input hooks are not supported on this platform")]
    Unsupported,
}

/// Platform mechanism that routes OS input events through an `EventFilter`
pub trait HookBackend: Send + Sync {
    fn install(&self, filter: Arc<EventFilter>) -> Result<Box<dyn HookHandle>, HookError>;
}

/// An installed hook; removing it stops event delivery
pub trait HookHandle: Send {
    fn remove(self: Box<Self>);
}

/// Backend for platforms without a system-wide hook
pub struct UnsupportedBackend;

impl HookBackend for UnsupportedBackend {
    fn install(&self, _filter: Arc<EventFilter>) -> Result<Box<dyn HookHandle>, HookError> {
        Err(HookError::Unsupported)
    }
}

/// Installs and removes the system-wide input hook
pub struct InputInterceptor {
    backend: Arc<dyn HookBackend>,
    filter: Arc<EventFilter>,
    state: HookState,
    handle: Option<Box<dyn HookHandle>>,
}

impl InputInterceptor {
    pub fn new(backend: Arc<dyn HookBackend>, filter: Arc<EventFilter>) -> Self {
        Self {
            backend,
            filter,
            state: HookState::Stopped,
            handle: None,
        }
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == HookState::Active
    }

    pub fn filter(&self) -> &Arc<EventFilter> {
        &self.filter
    }

    /// Install the hook and begin suppressing input
    pub fn start(&mut self) -> Result<(), HookError> {
        if self.is_active() {
            return Ok(());
        }

        self.state = HookState::Starting;
        debug!("installing input hook");

        match self.backend.install(Arc::clone(&self.filter)) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.filter.engage();
                self.state = HookState::Active;
                info!("input hook active");
                Ok(())
            }
            Err(e) => {
                self.state = HookState::Stopped;
                error!(%e, "failed to install input hook");
                Err(e)
            }
        }
    }

    /// Pass every event through while the hook is still installed
    pub fn disengage(&self) {
        self.filter.disengage();
    }

    /// Stop suppressing and remove the hook
    pub fn stop(&mut self) {
        self.filter.disengage();

        if let Some(handle) = self.handle.take() {
            self.state = HookState::Stopping;
            handle.remove();
            info!("input hook removed");
        }

        self.state = HookState::Stopped;
    }
}

impl Drop for InputInterceptor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_filter, MockBackend};

    #[test]
    fn test_start_and_stop() {
        let backend = Arc::new(MockBackend::default());
        let (filter, _keys, _signals) = test_filter(8);
        let mut interceptor = InputInterceptor::new(backend.clone(), filter.clone());
        assert_eq!(interceptor.state(), HookState::Stopped);

        tokio_test::assert_ok!(interceptor.start());
        assert_eq!(interceptor.state(), HookState::Active);
        assert!(filter.is_engaged());
        assert!(backend.is_installed());

        interceptor.stop();
        assert_eq!(interceptor.state(), HookState::Stopped);
        assert!(!filter.is_engaged());
        assert!(!backend.is_installed());
    }

    #[test]
    fn test_start_is_idempotent() {
        let backend = Arc::new(MockBackend::default());
        let (filter, _keys, _signals) = test_filter(8);
        let mut interceptor = InputInterceptor::new(backend.clone(), filter);

        interceptor.start().unwrap();
        interceptor.start().unwrap();
        assert_eq!(backend.install_count(), 1);
    }

    #[test]
    fn test_install_failure_leaves_hook_stopped() {
        let backend = Arc::new(MockBackend::failing());
        let (filter, _keys, _signals) = test_filter(8);
        let mut interceptor = InputInterceptor::new(backend, filter.clone());

        let err = tokio_test::assert_err!(interceptor.start());
        assert_eq!(err, HookError::EventTapCreation);
        assert_eq!(interceptor.state(), HookState::Stopped);
        assert!(!filter.is_engaged());
    }

    #[test]
    fn test_unsupported_backend() {
        let (filter, _keys, _signals) = test_filter(8);
        let mut interceptor = InputInterceptor::new(Arc::new(UnsupportedBackend), filter);
        assert_eq!(interceptor.start(), Err(HookError::Unsupported));
    }
}
