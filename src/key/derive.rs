//! Key derivation from configuration content
//!
//! The dependency hash combines only the *local* branch hash of each
//! closure member: the closure is already fully transitive, so a change
//! anywhere in the graph surfaces as a changed member hash without any
//! nested hash composition.

use crate::error::RecallResult;
use crate::key::closure::dependency_closure;
use crate::key::ModuleKey;
use crate::module::ModuleRegistry;
use crate::tree::ParamTree;

/// Derive the cache key for a module under the given configuration
pub fn derive_key(
    registry: &ModuleRegistry,
    params: &ParamTree,
    name: &str,
) -> RecallResult<ModuleKey> {
    let closure = dependency_closure(registry, name)?;

    let mut dep_tree = ParamTree::new("dependencies");
    for member in &closure {
        if member == name {
            continue;
        }
        let (_, member_hash) = params.branch_with_hash(member);
        dep_tree.set(member, member_hash)?;
    }
    let dependency_hash = dep_tree.hash();

    let (_, local_hash) = params.branch_with_hash(name);

    Ok(ModuleKey::new(name, local_hash, dependency_hash))
}
