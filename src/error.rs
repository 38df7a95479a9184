//! Error types for recall
//!
//! All modules use `RecallResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for recall operations
pub type RecallResult<T> = Result<T, RecallError>;

/// All errors that can occur in recall
#[derive(Error, Debug)]
pub enum RecallError {
    // Registry errors
    #[error("Module not found in registry: {0}")]
    ModuleNotFound(String),

    #[error("Module already registered: {0}")]
    ModuleExists(String),

    #[error("Invalid module name '{name}': {reason}")]
    InvalidModuleName { name: String, reason: String },

    // Dependency errors
    #[error("Dependency cycle detected involving module '{module}': {path}")]
    DependencyCycle { module: String, path: String },

    // Configuration tree errors
    #[error("Cannot modify frozen tree '{0}'")]
    FrozenTree(String),

    #[error("Invalid tree path '{path}': {reason}")]
    TreePath { path: String, reason: String },

    #[error("run_queue entry is not a module name: {0}")]
    RunQueueInvalid(String),

    // Settings errors
    #[error("Invalid settings at {path}: {reason}")]
    SettingsInvalid { path: PathBuf, reason: String },

    // Cache errors
    #[error("Failed to load cache entry {path}: {reason}")]
    CacheLoad { path: PathBuf, reason: String },

    #[error("Cache entry not present: {class} for key {key}")]
    CacheMiss { class: String, key: String },

    // Module execution errors
    #[error("Module '{module}' failed: {reason}")]
    ModuleFailed { module: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a module failure error
    pub fn module_failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleFailed {
            module: module.into(),
            reason: reason.into(),
        }
    }
}
