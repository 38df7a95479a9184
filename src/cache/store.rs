//! Two-tier cache facade
//!
//! Memory answers first; the disk layer, when configured, backs it.
//! `"results"` entries are subject to the configured eviction policy to
//! bound memory across long runs; evicted entries fall through to disk
//! (or recomputation when disk caching is disabled).

use crate::cache::classes;
use crate::cache::disk::DiskCache;
use crate::config::EvictionPolicy;
use crate::error::{RecallError, RecallResult};
use crate::key::ModuleKey;
use crate::tree::Value;
use std::collections::HashMap;
use tracing::debug;

type Slot = (ModuleKey, String);

/// The two-tier cache: process-memory layer plus optional disk layer
pub struct CacheStore {
    memory: HashMap<Slot, Value>,
    /// eviction scope -> currently resident results slot
    resident: HashMap<String, Slot>,
    policy: EvictionPolicy,
    disk: Option<DiskCache>,
}

impl CacheStore {
    /// Create a store with the given eviction policy and disk layer
    pub fn new(policy: EvictionPolicy, disk: Option<DiskCache>) -> Self {
        Self {
            memory: HashMap::new(),
            resident: HashMap::new(),
            policy,
            disk,
        }
    }

    /// The disk layer, if disk caching is enabled
    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Whether an object is present in memory or on disk
    pub fn contains(&self, key: &ModuleKey, class: &str) -> bool {
        let slot = (key.clone(), class.to_string());
        let present = self.memory.contains_key(&slot)
            || self
                .disk
                .as_ref()
                .is_some_and(|d| d.contains(key, class));

        if present {
            debug!("'{}' with key '{}' in cache", class, key);
        } else {
            debug!("'{}' with key '{}' NOT in cache", class, key);
        }
        present
    }

    /// Whether an object is resident in the memory layer only
    pub fn contains_in_memory(&self, key: &ModuleKey, class: &str) -> bool {
        self.memory
            .contains_key(&(key.clone(), class.to_string()))
    }

    /// Load an object, preferring the memory-resident copy
    ///
    /// Falls back to the disk layer; a corrupt or missing file is an
    /// error the caller treats as a miss.
    pub fn load(&self, key: &ModuleKey, class: &str) -> RecallResult<Value> {
        let slot = (key.clone(), class.to_string());
        if let Some(value) = self.memory.get(&slot) {
            return Ok(value.clone());
        }

        match &self.disk {
            Some(disk) => disk.load(key, class),
            None => Err(RecallError::CacheMiss {
                class: class.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Store an object in memory and write through to disk
    ///
    /// For `"results"`, the eviction policy is applied before the new
    /// entry is installed. Disk write failures do not propagate.
    pub fn store(&mut self, key: &ModuleKey, class: &str, value: Value) {
        let slot = (key.clone(), class.to_string());

        if class == classes::RESULTS {
            self.evict_for(&slot);
        }

        if let Some(disk) = &self.disk {
            disk.store(key, class, &value);
        }
        self.memory.insert(slot, value);
    }

    /// Apply the eviction policy ahead of installing a new results slot
    fn evict_for(&mut self, slot: &Slot) {
        let scope = match self.policy {
            EvictionPolicy::GlobalSlot => String::new(),
            EvictionPolicy::PerModule => slot.0.name().to_string(),
            EvictionPolicy::Unbounded => return,
        };
        if let Some(previous) = self.resident.insert(scope, slot.clone()) {
            if previous != *slot {
                debug!(
                    "Evicting resident results for '{}' from memory",
                    previous.0
                );
                self.memory.remove(&previous);
            }
        }
    }
}
