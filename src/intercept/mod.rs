//! System-wide input interception
//!
//! Uses macOS CGEventTap to suppress keyboard (and optionally mouse) input
//! while the lock is engaged, handing key presses to the effect pipeline.

mod filter;
mod interceptor;
mod keys;
#[cfg(target_os = "macos")]
mod tap;

pub use filter::{EventFilter, HookSignal, InputKind, RawInput, Verdict};
pub use interceptor::{
    HookBackend, HookError, HookHandle, HookState, InputInterceptor, UnsupportedBackend,
};
pub use keys::{codes, KeyEvent, Modifier, Modifiers, UnlockShortcut};
#[cfg(target_os = "macos")]
pub use tap::EventTapBackend;
