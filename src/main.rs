//! babylock-daemon: keyboard lock for small children
//!
//! This daemon runs as a LaunchAgent and provides:
//! - System-wide keyboard (and optionally mouse) suppression via CGEventTap
//! - Playful feedback per key press: spoken keys, spoken words with
//!   translations, word and animation overlays
//! - Accessibility permission tracking with automatic re-activation
//! - IPC server for the menu bar app (settings, word lists, overlay commands)
//!
//! Control+Option+U always unlocks.

mod config;
mod effects;
mod events;
mod intercept;
mod ipc;
mod lifecycle;
mod overlay;
mod permission;
mod settings;
mod speech;
mod state;
#[cfg(test)]
mod testing;
mod words;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::LockEvent;
use crate::intercept::HookBackend;
use crate::ipc::Server;
use crate::lifecycle::{App, AppDeps, ShutdownSignal};
use crate::overlay::BroadcastOverlay;
use crate::permission::PermissionProbe;
use crate::settings::SettingsStore;
use crate::speech::CommandEngine;

const EVENT_BUFFER: usize = 256;

#[cfg(target_os = "macos")]
fn platform_services() -> (Arc<dyn HookBackend>, Arc<dyn PermissionProbe>) {
    (
        Arc::new(intercept::EventTapBackend),
        Arc::new(permission::AccessibilityProbe),
    )
}

#[cfg(not(target_os = "macos"))]
fn platform_services() -> (Arc<dyn HookBackend>, Arc<dyn PermissionProbe>) {
    tracing::warn!("no system-wide input hook on this platform, locking will be inert");
    (
        Arc::new(intercept::UnsupportedBackend),
        Arc::new(permission::UnsupportedProbe),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "babylock-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.data_dir, "configuration loaded");

    // Register before anything can lock the keyboard
    let mut shutdown = ShutdownSignal::new()?;

    let store = SettingsStore::new(&config.settings_path, &config.words_path);

    // Controller, dispatcher and overlays -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<LockEvent>(EVENT_BUFFER);

    let engine = Arc::new(CommandEngine::discover(config.speech_program.clone()).await);
    let (backend, probe) = platform_services();

    let app = App::start(
        &config,
        store,
        AppDeps {
            backend,
            probe,
            engine,
            overlay: Arc::new(BroadcastOverlay::new(event_tx.clone())),
        },
        event_tx.clone(),
    );

    let server = match Server::new(&config.socket_path, app.control(), event_tx) {
        Ok(server) => server,
        Err(e) => {
            app.stop().await;
            return Err(e);
        }
    };

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    app.stop().await;
    server.shutdown().await;

    info!("babylock-daemon stopped");

    Ok(())
}
