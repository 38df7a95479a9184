//! Hierarchical configuration and payload trees
//!
//! `ParamTree` is the tree the engine runs against: a named node holding
//! scalar values, lists, and nested trees under dotted paths. It provides
//! the operations the caching core consumes: isolated copies, transient
//! marker stripping, freezing, branch extraction, and deterministic
//! content hashing.

pub mod hash;
pub mod io;

use crate::error::{RecallError, RecallResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single value stored in a tree: a scalar, a list, or a nested tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tree(ParamTree),
}

impl Value {
    /// Borrow as a string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Borrow as a tree, if this is a nested tree
    pub fn as_tree(&self) -> Option<&ParamTree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Borrow as an integer, if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this value is a nested tree
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree(_))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<ParamTree> for Value {
    fn from(v: ParamTree) -> Self {
        Self::Tree(v)
    }
}

/// A named tree node
///
/// Entries keep deterministic (sorted) storage for hashing, while
/// iteration follows insertion order so result mappings preserve
/// first-occurrence ordering. Entries can carry a transient marker:
/// transient entries are scratch data, excluded from content hashes
/// and removed by [`ParamTree::attach`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamTree {
    name: String,
    entries: BTreeMap<String, Value>,
    #[serde(skip)]
    order: Vec<String>,
    #[serde(skip)]
    transient: BTreeSet<String>,
    #[serde(skip)]
    frozen: bool,
}

impl PartialEq for ParamTree {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries
    }
}

impl ParamTree {
    /// Create an empty, unfrozen tree
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            order: Vec::new(),
            transient: BTreeSet::new(),
            frozen: false,
        }
    }

    /// The tree's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of direct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no direct entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the tree has been frozen
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Set a value under a dotted path, creating intermediate trees
    ///
    /// Fails if the tree (or an intermediate node) is frozen, or if an
    /// intermediate path segment is occupied by a non-tree value.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> RecallResult<()> {
        if self.frozen {
            return Err(RecallError::FrozenTree(self.name.clone()));
        }
        match path.split_once('.') {
            None => {
                if path.is_empty() {
                    return Err(RecallError::TreePath {
                        path: path.to_string(),
                        reason: "empty path segment".to_string(),
                    });
                }
                if !self.entries.contains_key(path) {
                    self.order.push(path.to_string());
                }
                self.entries.insert(path.to_string(), value.into());
                Ok(())
            }
            Some((head, rest)) => {
                if head.is_empty() {
                    return Err(RecallError::TreePath {
                        path: path.to_string(),
                        reason: "empty path segment".to_string(),
                    });
                }
                if !self.entries.contains_key(head) {
                    self.order.push(head.to_string());
                    self.entries
                        .insert(head.to_string(), Value::Tree(ParamTree::new(head)));
                }
                match self.entries.get_mut(head) {
                    Some(Value::Tree(t)) => t.set(rest, value),
                    _ => Err(RecallError::TreePath {
                        path: path.to_string(),
                        reason: format!("'{}' is not a tree", head),
                    }),
                }
            }
        }
    }

    /// Get a value under a dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            None => self.entries.get(path),
            Some((head, rest)) => match self.entries.get(head) {
                Some(Value::Tree(t)) => t.get(rest),
                _ => None,
            },
        }
    }

    /// Get a string value under a dotted path
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Get a nested tree under a dotted path
    pub fn get_tree(&self, path: &str) -> Option<&ParamTree> {
        self.get(path).and_then(Value::as_tree)
    }

    /// Whether a value exists under a dotted path
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Iterate direct entries in insertion order
    ///
    /// Entries without recorded insertion order (e.g. after
    /// deserialization) follow in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        let ordered = self
            .order
            .iter()
            .filter_map(|k| self.entries.get_key_value(k));
        let rest = self
            .entries
            .iter()
            .filter(|(k, _)| !self.order.contains(*k));
        ordered
            .chain(rest)
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Mark a direct entry as transient scratch data
    ///
    /// Transient entries do not contribute to the content hash and are
    /// removed by [`attach`](Self::attach).
    pub fn set_transient(&mut self, key: &str) -> RecallResult<()> {
        if self.frozen {
            return Err(RecallError::FrozenTree(self.name.clone()));
        }
        if !self.entries.contains_key(key) {
            return Err(RecallError::TreePath {
                path: key.to_string(),
                reason: "no such entry".to_string(),
            });
        }
        self.transient.insert(key.to_string());
        Ok(())
    }

    /// Whether a direct entry is marked transient
    pub fn is_transient(&self, key: &str) -> bool {
        self.transient.contains(key)
    }

    /// Strip transient markers, removing the marked entries
    ///
    /// Called before a run so stale scratch data from earlier processing
    /// is recomputed rather than reused.
    pub fn attach(&mut self, recursive: bool) -> RecallResult<()> {
        if self.frozen {
            return Err(RecallError::FrozenTree(self.name.clone()));
        }
        for key in std::mem::take(&mut self.transient) {
            self.entries.remove(&key);
            self.order.retain(|k| k != &key);
        }
        if recursive {
            for value in self.entries.values_mut() {
                if let Value::Tree(t) = value {
                    t.attach(true)?;
                }
            }
        }
        Ok(())
    }

    /// Freeze this tree and every subtree, rejecting further mutation
    pub fn freeze(&mut self) {
        self.frozen = true;
        for value in self.entries.values_mut() {
            if let Value::Tree(t) = value {
                t.freeze();
            }
        }
    }

    /// Take an isolated, unfrozen deep copy
    pub fn copy(&self) -> ParamTree {
        let mut copied = self.clone();
        copied.unfreeze_all();
        copied
    }

    fn unfreeze_all(&mut self) {
        self.frozen = false;
        for value in self.entries.values_mut() {
            if let Value::Tree(t) = value {
                t.unfreeze_all();
            }
        }
    }

    /// Extract the branch for a module name
    ///
    /// A missing branch yields an empty tree; a scalar at the branch path
    /// is wrapped in a single-entry tree so distinct scalars keep distinct
    /// hashes.
    pub fn branch(&self, name: &str) -> ParamTree {
        match self.get(name) {
            Some(Value::Tree(t)) => {
                let mut b = t.clone();
                b.name = name.to_string();
                b
            }
            Some(scalar) => {
                let mut b = ParamTree::new(name);
                // infallible: fresh unfrozen tree, single-segment path
                let _ = b.set("value", scalar.clone());
                b
            }
            None => ParamTree::new(name),
        }
    }

    /// Extract a branch together with its deterministic content hash
    pub fn branch_with_hash(&self, name: &str) -> (ParamTree, String) {
        let b = self.branch(name);
        let h = b.hash();
        (b, h)
    }

    /// Deterministic content hash of this tree
    ///
    /// Transient entries are excluded; entry order does not matter.
    pub fn hash(&self) -> String {
        hash::tree_hash(self)
    }

    pub(crate) fn entries_map(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    pub(crate) fn transient_keys(&self) -> &BTreeSet<String> {
        &self.transient
    }
}
