//! Accessibility permission tracking
//!
//! System-wide interception needs the macOS Accessibility grant. The gate
//! polls it and publishes changes, including flips made in System Settings
//! while the daemon runs.

mod gate;
mod probe;

pub use gate::PermissionGate;
#[cfg(target_os = "macos")]
pub use probe::AccessibilityProbe;
#[cfg(not(target_os = "macos"))]
pub use probe::UnsupportedProbe;
pub use probe::{PermissionError, PermissionProbe};
