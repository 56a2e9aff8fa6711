//! Feedback effects for suppressed keys

mod dispatcher;
mod types;

pub use dispatcher::{DispatchInputs, EffectDispatcher};
pub use types::{clamp_display_secs, EffectSettings, LockEffect, DEFAULT_WORD_DISPLAY_SECS};
