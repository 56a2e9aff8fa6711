//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[cfg(target_os = "macos")]
const DEFAULT_SPEECH_PROGRAM: &str = "say";
#[cfg(not(target_os = "macos"))]
const DEFAULT_SPEECH_PROGRAM: &str = "espeak";

const DEFAULT_SPEECH_QUEUE_DEPTH: usize = 3;
const DEFAULT_KEY_BUFFER: usize = 64;
const DEFAULT_PERMISSION_POLL_MS: u64 = 1000;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    pub settings_path: PathBuf,
    pub words_path: PathBuf,

    /// Text-to-speech program taking `-v <voice> <text>`
    pub speech_program: String,

    /// Utterances allowed to wait behind the one playing
    pub speech_queue_depth: usize,

    /// Key events buffered between the hook and the dispatcher
    pub key_buffer: usize,

    /// How often the accessibility grant is re-checked
    pub permission_poll: Duration,

    /// Swallow mouse input while locked
    pub block_mouse: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match lookup("BABYLOCK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("babylock")
            }
        };

        let speech_queue_depth: usize =
            parse(&lookup, "BABYLOCK_SPEECH_QUEUE_DEPTH")?.unwrap_or(DEFAULT_SPEECH_QUEUE_DEPTH);
        let key_buffer: usize = parse(&lookup, "BABYLOCK_KEY_BUFFER")?.unwrap_or(DEFAULT_KEY_BUFFER);
        let poll_ms: u64 =
            parse(&lookup, "BABYLOCK_PERMISSION_POLL_MS")?.unwrap_or(DEFAULT_PERMISSION_POLL_MS);

        anyhow::ensure!(speech_queue_depth > 0, "BABYLOCK_SPEECH_QUEUE_DEPTH must be at least 1");
        anyhow::ensure!(key_buffer > 0, "BABYLOCK_KEY_BUFFER must be at least 1");
        anyhow::ensure!(poll_ms > 0, "BABYLOCK_PERMISSION_POLL_MS must be at least 1");

        Ok(Self {
            socket_path: data_dir.join("daemon.sock"),
            settings_path: data_dir.join("settings.json"),
            words_path: data_dir.join("words.json"),
            data_dir,
            speech_program: lookup("BABYLOCK_SPEECH_PROGRAM")
                .unwrap_or_else(|| DEFAULT_SPEECH_PROGRAM.to_string()),
            speech_queue_depth,
            key_buffer,
            permission_poll: Duration::from_millis(poll_ms),
            block_mouse: parse(&lookup, "BABYLOCK_BLOCK_MOUSE")?.unwrap_or(false),
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("invalid value for {name}: {raw:?}"))
        })
        .transpose()
}
