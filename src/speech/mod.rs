//! Speech synthesis: engines and the playback queue

mod engine;
mod queue;

pub use engine::{CommandEngine, SpeechEngine, SpeechError};
pub use queue::{EnqueueOutcome, SpeechQueue, VoicePreference};
