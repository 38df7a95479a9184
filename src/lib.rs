//! recall - Memoizing module runner
//!
//! Runs named computation modules against a hierarchical configuration
//! tree and caches their results under content-derived keys, so identical
//! inputs are never recomputed. Results live in a two-tier cache (process
//! memory backed by an optional disk directory); post-computation report
//! callbacks are delivered exactly once per invocation key per process.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod module;
pub mod pool;
pub mod tree;

pub use cache::classes;
pub use config::{EvictionPolicy, Settings};
pub use engine::{Engine, ResultsRequest, SharedInstance};
pub use error::{RecallError, RecallResult};
pub use key::ModuleKey;
pub use module::{DependencyKind, Module, ModuleContext, ModuleInstance, ModuleRegistry};
pub use pool::{ObjectPool, SharedObject};
pub use tree::{ParamTree, Value};
