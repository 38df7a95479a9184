//! Disk cache layer
//!
//! Content-addressed files under a root directory owned by this process
//! for the duration of a run. Load failures surface as errors the caller
//! treats as misses; store failures never propagate.

use crate::error::RecallResult;
use crate::key::ModuleKey;
use crate::tree::{io, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

const CACHE_SUFFIX: &str = ".cache";

/// Disk-backed cache layer rooted at a directory
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    read_only: bool,
}

impl DiskCache {
    /// Create a disk layer over a root directory
    pub fn new(root: impl Into<PathBuf>, read_only: bool) -> Self {
        Self {
            root: root.into(),
            read_only,
        }
    }

    /// The cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether writes are suppressed
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// The file a key/class pair is addressed to:
    /// `root/<name>/<class>/<local>-<dependency>.cache`
    pub fn file_path(&self, key: &ModuleKey, class: &str) -> PathBuf {
        self.root
            .join(key.name())
            .join(class)
            .join(format!("{}{}", key.file_stem(), CACHE_SUFFIX))
    }

    /// Whether a cache file exists for the key/class pair
    pub fn contains(&self, key: &ModuleKey, class: &str) -> bool {
        self.file_path(key, class).is_file()
    }

    /// Load and deserialize a cache file
    pub fn load(&self, key: &ModuleKey, class: &str) -> RecallResult<Value> {
        let path = self.file_path(key, class);
        debug!("Loading '{}' from {}", class, path.display());
        io::load_payload(&path)
    }

    /// Serialize a payload to its addressed file
    ///
    /// Creates parent directories on demand. Failures are logged and the
    /// partially written file is removed; they do not propagate, so the
    /// memory layer stays authoritative for the rest of the process.
    pub fn store(&self, key: &ModuleKey, class: &str, value: &Value) {
        if self.read_only {
            return;
        }

        let path = self.file_path(key, class);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!(
                        "Failed to create cache directory {}: {}",
                        parent.display(),
                        e
                    );
                    return;
                }
            }
        }

        debug!("Saving '{}' to {}", class, path.display());
        if let Err(e) = io::save_payload(&path, value) {
            error!("Failed to save cache file {}: {}", path.display(), e);
            let _ = fs::remove_file(&path);
        }
    }
}
