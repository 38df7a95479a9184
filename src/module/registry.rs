//! Module name registry
//!
//! Maps lower-case module names to their definitions. Names become cache
//! directory components, so registration validates them the same way
//! paths are validated elsewhere: no separators, no traversal.

use crate::error::{RecallError, RecallResult};
use crate::module::Module;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Process-wide module registry, built at startup and handed to the engine
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under a name
    ///
    /// Names must be lower-case alphanumeric plus `-`/`_`. Registering a
    /// name twice is an error.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        module: Arc<dyn Module>,
    ) -> RecallResult<()> {
        let name = name.into();
        validate_module_name(&name)?;

        if self.modules.contains_key(&name) {
            return Err(RecallError::ModuleExists(name));
        }

        debug!("Registered module '{}'", name);
        self.modules.insert(name, module);
        Ok(())
    }

    /// Look up a definition by name
    pub fn lookup(&self, name: &str) -> RecallResult<&Arc<dyn Module>> {
        self.modules
            .get(name)
            .ok_or_else(|| RecallError::ModuleNotFound(name.to_string()))
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

/// Validate that a module name is safe as a cache path component
fn validate_module_name(name: &str) -> RecallResult<()> {
    if name.is_empty() {
        return Err(RecallError::InvalidModuleName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(RecallError::InvalidModuleName {
            name: name.to_string(),
            reason: "must contain only lower-case alphanumeric characters, hyphens, or underscores"
                .to_string(),
        });
    }
    Ok(())
}
