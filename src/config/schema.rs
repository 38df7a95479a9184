//! Settings schema for recall
//!
//! Operating parameters arrive as configuration, not CLI flags. A settings
//! file is optional; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cache settings
    pub cache: CacheSettings,
}

/// Disk and memory cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory; absent means disk caching is fully disabled.
    /// A leading `~` is expanded to the home directory.
    pub dir: Option<PathBuf>,

    /// Read the disk cache but never write to it
    pub read_only: bool,

    /// Memory eviction policy for `"results"` entries
    pub eviction: EvictionPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            read_only: false,
            eviction: EvictionPolicy::GlobalSlot,
        }
    }
}

/// Memory eviction policy for result payloads
///
/// Only `"results"` entries are ever evicted; other object classes stay
/// resident unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// One resident result entry total, across all module names. The
    /// historical default: storing any module's result evicts whichever
    /// result was resident before, whatever module produced it.
    GlobalSlot,
    /// One resident result entry per module name
    PerModule,
    /// Never evict
    Unbounded,
}
