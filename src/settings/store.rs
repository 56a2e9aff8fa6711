//! JSON files under the data directory
//!
//! Loads never fail: a missing or unreadable file yields defaults. Saves go
//! through a temporary file and a rename so a crash never leaves a torn file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Settings, WordLists};

/// Errors from saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reads and writes `settings.json` and `words.json`
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings_path: PathBuf,
    words_path: PathBuf,
}

impl SettingsStore {
    pub fn new(settings_path: impl Into<PathBuf>, words_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            words_path: words_path.into(),
        }
    }

    pub fn load_settings(&self) -> Settings {
        load_or_default(&self.settings_path)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
        save_atomic(&self.settings_path, settings)
    }

    pub fn load_words(&self) -> WordLists {
        load_or_default(&self.words_path)
    }

    pub fn save_words(&self, words: &WordLists) -> Result<(), SettingsError> {
        save_atomic(&self.words_path, words)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no stored file, using defaults");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), %e, "failed to read stored file, using defaults");
            return T::default();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), %e, "stored file is corrupt, using defaults");
            T::default()
        }
    }
}

fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), "saved");
    Ok(())
}
