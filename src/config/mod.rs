//! Operating settings for recall

pub mod schema;

pub use schema::{CacheSettings, EvictionPolicy, Settings};

use crate::error::{RecallError, RecallResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist
    pub fn load_from_file(path: &Path) -> RecallResult<Settings> {
        if !path.exists() {
            debug!("Settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| RecallError::io(format!("reading settings from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| RecallError::SettingsInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The conventional cache location for callers that want one
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recall")
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(stripped) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(stripped),
        None => path.to_path_buf(),
    }
}
