//! Cache key derivation
//!
//! A [`ModuleKey`] identifies one cacheable invocation: the module name,
//! the hash of its own configuration branch, and the combined hash of the
//! branches of everything in its dependency closure. Two invocations are
//! cache-equivalent iff all three parts match.

pub mod closure;
pub mod derive;

pub use closure::dependency_closure;
pub use derive::derive_key;

use std::fmt;

/// Identity of one cacheable module invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    name: String,
    local_hash: String,
    dependency_hash: String,
}

impl ModuleKey {
    /// Create a key from its three parts
    pub fn new(
        name: impl Into<String>,
        local_hash: impl Into<String>,
        dependency_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_hash: local_hash.into(),
            dependency_hash: dependency_hash.into(),
        }
    }

    /// The module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hash of the module's own configuration branch
    pub fn local_hash(&self) -> &str {
        &self.local_hash
    }

    /// Combined hash of the dependency closure's branches
    pub fn dependency_hash(&self) -> &str {
        &self.dependency_hash
    }

    /// A copy with either hash part substituted
    ///
    /// Used by modules persisting ancillary blobs under a variant of
    /// their own key.
    pub fn with_overrides(
        &self,
        local_hash: Option<&str>,
        dependency_hash: Option<&str>,
    ) -> ModuleKey {
        ModuleKey {
            name: self.name.clone(),
            local_hash: local_hash.unwrap_or(&self.local_hash).to_string(),
            dependency_hash: dependency_hash
                .unwrap_or(&self.dependency_hash)
                .to_string(),
        }
    }

    /// File stem used for disk addressing: `<local>-<dependency>`
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.local_hash, self.dependency_hash)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.local_hash, self.dependency_hash)
    }
}
