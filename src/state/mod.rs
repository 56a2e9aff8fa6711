//! Lock state ownership
//!
//! The controller is the only writer of the lock state. Other components
//! observe it through `watch` receivers or send it `ControlCommand`s.

mod controller;

pub use controller::{ControlCommand, ControllerParts, LockState, LockStateController, LockStatus};
