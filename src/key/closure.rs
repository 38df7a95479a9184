//! Dependency closure computation
//!
//! The closure of a module is the set of names its cache key must cover:
//! its parameter dependencies, plus, for every result or module
//! dependency, that dependency's own closure. Because each recursive call
//! expands fully, the result is flat: a transitively-changed grandchild
//! appears as a direct member, so key derivation never needs nested
//! hash-of-hashes composition.

use crate::error::{RecallError, RecallResult};
use crate::module::{DependencyKind, ModuleRegistry};
use std::collections::BTreeSet;

/// Compute the dependency closure of a module
///
/// Direct self-references are skipped. A cycle through other modules is
/// an error naming the offending path; the module graph must be acyclic
/// under result/module dependency edges.
pub fn dependency_closure(
    registry: &ModuleRegistry,
    name: &str,
) -> RecallResult<BTreeSet<String>> {
    let mut in_progress = Vec::new();
    expand(registry, name, &mut in_progress)
}

fn expand(
    registry: &ModuleRegistry,
    name: &str,
    in_progress: &mut Vec<String>,
) -> RecallResult<BTreeSet<String>> {
    if in_progress.iter().any(|n| n == name) {
        let mut path: Vec<&str> = in_progress.iter().map(String::as_str).collect();
        path.push(name);
        return Err(RecallError::DependencyCycle {
            module: name.to_string(),
            path: path.join(" -> "),
        });
    }

    let def = registry.lookup(name)?;
    let mut set = def.dependencies(DependencyKind::Parameter);

    let mut walk = def.dependencies(DependencyKind::Result);
    walk.extend(def.dependencies(DependencyKind::Module));

    in_progress.push(name.to_string());
    for dep in walk {
        if dep == name {
            continue;
        }
        set.extend(expand(registry, &dep, in_progress)?);
    }
    in_progress.pop();

    Ok(set)
}
