//! Module system traits and interfaces
//!
//! A module is a named computation unit: its definition declares the
//! dependency structure used for cache-key derivation, receives the
//! post-computation report callback, and constructs runnable instances.
//! Definitions register under a name in a [`ModuleRegistry`] built at
//! startup; the engine resolves names through that registry only.

pub mod registry;

pub use registry::ModuleRegistry;

use crate::error::RecallResult;
use crate::key::ModuleKey;
use crate::tree::{ParamTree, Value};
use std::collections::BTreeSet;

/// The three declared dependency kinds
///
/// Parameter dependencies are consulted for key derivation but not
/// walked further; result and module dependencies are walked
/// transitively when computing the dependency closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Parameter,
    Result,
    Module,
}

/// Context handed to a module instance at construction
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// The derived key identifying this invocation
    pub key: ModuleKey,
    /// Isolated copy of the full configuration tree
    pub params: ParamTree,
    /// The module's own configuration branch
    pub local: ParamTree,
}

/// A registered module definition
///
/// One definition exists per module name; the engine consults it for
/// dependency declarations and report delivery without instantiating,
/// and calls [`instantiate`](Module::instantiate) only on a cache miss.
pub trait Module {
    /// Declared dependencies of the given kind, as module names
    fn dependencies(&self, kind: DependencyKind) -> BTreeSet<String>;

    /// Construct a runnable instance for one invocation
    fn instantiate(&self, ctx: ModuleContext) -> RecallResult<Box<dyn ModuleInstance>>;

    /// Post-computation hook, delivered at most once per (name, key)
    /// per process, whether the result was computed or loaded from cache
    fn report_results(
        &self,
        params: &ParamTree,
        local: &ParamTree,
        results: &Value,
    ) -> RecallResult<()> {
        let _ = (params, local, results);
        Ok(())
    }

    /// When true, results are never cached for this module: every
    /// request recomputes and re-reports
    fn result_caching_disabled(&self) -> bool {
        false
    }
}

/// A live module instance
///
/// The engine keeps at most one per module name, replaced whenever the
/// derived key for that name changes.
pub trait ModuleInstance {
    /// Execute the module, returning its result payload or nothing
    fn run(&mut self) -> RecallResult<Option<Value>>;

    /// Receive the invocation's (possibly cached) result set after the
    /// single-module path completes
    fn set_local_results(&mut self, results: Value) {
        let _ = results;
    }
}
