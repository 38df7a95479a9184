//! Common object pool
//!
//! A secondary cache for shared, possibly-stateful singletons such as
//! open database handles, independent of the result cache. Entries are
//! keyed by pool name and module key. Storing into a pool first purges
//! every non-persistent entry of that pool, whatever its key, so at most
//! one non-persistent object is alive per pool at a time; persistent
//! entries accumulate for the life of the process.

use crate::key::ModuleKey;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Opaque shared handle stored in a pool; callers downcast
pub type SharedObject = Arc<dyn Any + Send + Sync>;

struct PoolEntry {
    persistent: bool,
    object: SharedObject,
}

/// Pools of shared objects, owned by the engine
#[derive(Default)]
pub struct ObjectPool {
    pools: HashMap<String, HashMap<ModuleKey, PoolEntry>>,
}

impl ObjectPool {
    /// Create an empty pool set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an object is held under (pool, key)
    pub fn contains(&self, pool: &str, key: &ModuleKey) -> bool {
        self.pools
            .get(pool)
            .is_some_and(|p| p.contains_key(key))
    }

    /// Fetch the object under (pool, key), if present
    pub fn get(&self, pool: &str, key: &ModuleKey) -> Option<SharedObject> {
        self.pools
            .get(pool)
            .and_then(|p| p.get(key))
            .map(|entry| entry.object.clone())
    }

    /// Install an object under (pool, key)
    ///
    /// Purges every non-persistent entry of the pool first.
    pub fn store(
        &mut self,
        pool: &str,
        key: &ModuleKey,
        object: SharedObject,
        persistent: bool,
    ) -> SharedObject {
        let entries = self.pools.entry(pool.to_string()).or_default();

        let before = entries.len();
        entries.retain(|_, entry| entry.persistent);
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} non-persistent object(s) from pool '{}'", purged, pool);
        }

        entries.insert(
            key.clone(),
            PoolEntry {
                persistent,
                object: object.clone(),
            },
        );
        object
    }

    /// Install the object produced by `factory` under (pool, key)
    ///
    /// Same purge semantics as [`store`](Self::store); the factory runs
    /// after the purge so a fresh object can replace the one just
    /// released.
    pub fn store_with(
        &mut self,
        pool: &str,
        key: &ModuleKey,
        persistent: bool,
        factory: impl FnOnce() -> SharedObject,
    ) -> SharedObject {
        let entries = self.pools.entry(pool.to_string()).or_default();
        entries.retain(|_, entry| entry.persistent);

        let object = factory();
        entries.insert(
            key.clone(),
            PoolEntry {
                persistent,
                object: object.clone(),
            },
        );
        object
    }
}
