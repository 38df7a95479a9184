//! Deterministic content hashing for trees and values
//!
//! Hashes cover value content only: entry keys and values in sorted key
//! order, with type tags so differently-typed but same-byte contents
//! cannot collide. Transient entries are excluded. The result is the
//! first 12 hex characters of a SHA-256 digest.

use crate::tree::{ParamTree, Value};
use sha2::{Digest, Sha256};

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STR: u8 = 0x04;
const TAG_LIST: u8 = 0x05;
const TAG_TREE: u8 = 0x06;

/// Content hash of a tree, as 12 hex characters (6 bytes of SHA-256)
pub fn tree_hash(tree: &ParamTree) -> String {
    let mut hasher = Sha256::new();
    feed_tree(&mut hasher, tree);
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

/// Content hash of a single value, as 12 hex characters
pub fn value_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    feed_value(&mut hasher, value);
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

fn feed_tree(hasher: &mut Sha256, tree: &ParamTree) {
    hasher.update([TAG_TREE]);
    let transient = tree.transient_keys();
    let entries: Vec<_> = tree
        .entries_map()
        .iter()
        .filter(|(k, _)| !transient.contains(*k))
        .collect();
    hasher.update((entries.len() as u64).to_le_bytes());
    for (key, value) in entries {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        feed_value(hasher, value);
    }
}

fn feed_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Bool(b) => {
            hasher.update([TAG_BOOL, u8::from(*b)]);
        }
        Value::Int(i) => {
            hasher.update([TAG_INT]);
            hasher.update(i.to_le_bytes());
        }
        Value::Float(f) => {
            hasher.update([TAG_FLOAT]);
            hasher.update(f.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            hasher.update([TAG_STR]);
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::List(items) => {
            hasher.update([TAG_LIST]);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed_value(hasher, item);
            }
        }
        Value::Tree(t) => feed_tree(hasher, t),
    }
}
