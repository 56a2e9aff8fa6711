//! Process lifecycle: component wiring and signal handling

mod app;
mod shutdown;

pub use app::{App, AppDeps};
pub use shutdown::ShutdownSignal;
