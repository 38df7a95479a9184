//! Payload persistence for cache files
//!
//! The disk format is tree-uniform: every cache file holds a serialized
//! `ParamTree`. Scalar payloads are wrapped in a single-entry tree named
//! [`VALUE_WRAPPER`] on save and unwrapped on load, so a stored scalar
//! round-trips as itself.

use crate::error::{RecallError, RecallResult};
use crate::tree::{ParamTree, Value};
use std::fs;
use std::path::Path;

/// Tree name marking a wrapped scalar payload
pub const VALUE_WRAPPER: &str = "__value_wrapper__";

const WRAPPER_KEY: &str = "value";

/// Serialize a payload to a cache file, wrapping scalars
pub fn save_payload(path: &Path, value: &Value) -> RecallResult<()> {
    let bytes = match value {
        Value::Tree(t) => serde_json::to_vec(t)?,
        scalar => {
            let mut wrapper = ParamTree::new(VALUE_WRAPPER);
            wrapper.set(WRAPPER_KEY, scalar.clone())?;
            serde_json::to_vec(&wrapper)?
        }
    };
    fs::write(path, bytes)
        .map_err(|e| RecallError::io(format!("writing cache file {}", path.display()), e))
}

/// Deserialize a payload from a cache file, unwrapping scalars
pub fn load_payload(path: &Path) -> RecallResult<Value> {
    let bytes = fs::read(path).map_err(|e| RecallError::CacheLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let tree: ParamTree =
        serde_json::from_slice(&bytes).map_err(|e| RecallError::CacheLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if tree.name() == VALUE_WRAPPER && tree.len() == 1 {
        if let Some(inner) = tree.get(WRAPPER_KEY) {
            return Ok(inner.clone());
        }
    }

    Ok(Value::Tree(tree))
}
