//! The coordination engine
//!
//! Owns every piece of mutable run state: the two-tier cache, the live
//! module instances, the set of delivered reports, and the common object
//! pool. The main entry point is [`Engine::get_results`]: derive the key
//! for each requested module, answer from cache when possible, otherwise
//! instantiate and run the module, then persist and report the result.
//! The report callback fires at most once per (name, key) per process,
//! whether the result was computed or loaded.

use crate::cache::{classes, CacheStore, DiskCache};
use crate::config::{expand_home, Settings};
use crate::error::{RecallError, RecallResult};
use crate::key::{dependency_closure, derive_key, ModuleKey};
use crate::module::{ModuleContext, ModuleInstance, ModuleRegistry};
use crate::pool::ObjectPool;
use crate::tree::{ParamTree, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, error, info};

/// A live module instance shared between the engine and its caller
pub type SharedInstance = Rc<RefCell<Box<dyn ModuleInstance>>>;

/// What the caller is asking `get_results` to compute
#[derive(Debug, Clone)]
pub enum ResultsRequest {
    /// Run the `run_queue` list from the configuration tree
    Default,
    /// Run a single named module
    One(String),
    /// Run the given modules in order
    Many(Vec<String>),
}

impl From<&str> for ResultsRequest {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<String> for ResultsRequest {
    fn from(name: String) -> Self {
        Self::One(name)
    }
}

impl From<Vec<String>> for ResultsRequest {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

impl From<&[&str]> for ResultsRequest {
    fn from(names: &[&str]) -> Self {
        Self::Many(names.iter().map(|s| s.to_string()).collect())
    }
}

struct LiveModule {
    key: ModuleKey,
    instance: SharedInstance,
}

/// The command and control center coordinating module runs
///
/// All state is owned here; nothing is ambient or global. One engine
/// owns its disk cache directory for the duration of the process.
pub struct Engine {
    registry: ModuleRegistry,
    cache: CacheStore,
    pool: ObjectPool,
    live: HashMap<String, LiveModule>,
    reported: HashSet<ModuleKey>,
    logged_closures: HashSet<String>,
}

impl Engine {
    /// Create an engine over a registry with the given settings
    pub fn new(registry: ModuleRegistry, settings: &Settings) -> Self {
        let disk = match &settings.cache.dir {
            Some(dir) => {
                let dir = expand_home(dir);
                info!("Using cache directory {}", dir.display());
                Some(DiskCache::new(dir, settings.cache.read_only))
            }
            None => {
                info!("Not using disk cache");
                None
            }
        };

        Self {
            registry,
            cache: CacheStore::new(settings.cache.eviction, disk),
            pool: ObjectPool::new(),
            live: HashMap::new(),
            reported: HashSet::new(),
            logged_closures: HashSet::new(),
        }
    }

    /// The module registry this engine resolves names through
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// The common object pool
    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    /// Mutable access to the common object pool
    pub fn pool_mut(&mut self) -> &mut ObjectPool {
        &mut self.pool
    }

    /// Compute results for the requested modules
    ///
    /// Takes an isolated copy of the configuration with transient markers
    /// stripped, resolves the request (the `run_queue` entry of the
    /// configuration when none is given), and returns a frozen mapping of
    /// lower-cased module name to result, ordered by first occurrence.
    /// Duplicate names are computed once.
    pub fn get_results(
        &mut self,
        params: &ParamTree,
        request: impl Into<ResultsRequest>,
    ) -> RecallResult<ParamTree> {
        let mut params = params.copy();
        params.attach(true)?;

        let names = match request.into() {
            ResultsRequest::Default => {
                let queue = run_queue(&params)?;
                debug!(
                    "Results requested for modules {}, from run_queue",
                    queue.join(", ")
                );
                queue
            }
            ResultsRequest::One(name) => vec![name],
            ResultsRequest::Many(names) => {
                debug!("Results requested for modules {}", names.join(", "));
                names
            }
        };

        let mut results = ParamTree::new("results");
        for requested in &names {
            let name = requested.to_lowercase();
            if !results.contains(&name) {
                let value = self.results_for(&params, &name, None, None)?;
                results.set(&name, value)?;
            }
        }
        results.freeze();

        Ok(results)
    }

    /// Obtain the live instance for a module, computing its results first
    ///
    /// Reuses the existing instance when the freshly derived key matches
    /// the one it was built under; otherwise constructs a replacement via
    /// the registry. The instance receives the invocation's result set
    /// before being returned.
    pub fn get_module(&mut self, params: &ParamTree, name: &str) -> RecallResult<SharedInstance> {
        let params = params.copy();
        let name = name.to_lowercase();
        debug!("Retrieving module {}", name);

        let key = self.module_key(&params, &name)?;
        let instance = self.obtain_instance(&params, &name, &key)?;
        let results = self.results_for(&params, &name, Some(key), Some(instance.clone()))?;
        instance.borrow_mut().set_local_results(results);

        Ok(instance)
    }

    /// Derive the cache key for a module under the given configuration
    pub fn module_key(&mut self, params: &ParamTree, name: &str) -> RecallResult<ModuleKey> {
        // log each module's closure once per process, not per derivation
        if !self.logged_closures.contains(name) {
            let closure = dependency_closure(&self.registry, name)?;
            let members: Vec<&str> = closure.iter().map(String::as_str).collect();
            debug!("Dependency closure for '{}': {}", name, members.join(", "));
            self.logged_closures.insert(name.to_string());
        }

        derive_key(&self.registry, params, name)
    }

    /// Whether an object is cached under (key, class)
    ///
    /// Always false for `"results"` of a module that disables result
    /// caching.
    pub fn in_cache(&self, key: &ModuleKey, class: &str) -> bool {
        if class == classes::RESULTS && self.results_caching_disabled(key.name()) {
            return false;
        }
        self.cache.contains(key, class)
    }

    /// Load an object from the cache
    pub fn load_from_cache(&self, key: &ModuleKey, class: &str) -> RecallResult<Value> {
        debug!("Loading '{}' from cache with key '{}'", class, key);
        self.cache.load(key, class)
    }

    /// Store an object in the cache
    ///
    /// A no-op for `"results"` of a module that disables result caching.
    /// Combine with [`ModuleKey::with_overrides`] to persist ancillary
    /// blobs under a variant of a module's key.
    pub fn save_to_cache(&mut self, key: &ModuleKey, class: &str, value: Value) {
        if class == classes::RESULTS && self.results_caching_disabled(key.name()) {
            return;
        }
        debug!("Saving '{}' to cache with key '{}'", class, key);
        self.cache.store(key, class, value);
    }

    fn results_caching_disabled(&self, name: &str) -> bool {
        self.registry
            .lookup(name)
            .map(|def| def.result_caching_disabled())
            .unwrap_or(false)
    }

    /// The single-module path: cache check, execution, store, report
    fn results_for(
        &mut self,
        params: &ParamTree,
        name: &str,
        key: Option<ModuleKey>,
        instance: Option<SharedInstance>,
    ) -> RecallResult<Value> {
        debug!("Retrieving results for module '{}'", name);

        let key = match key {
            Some(key) => key,
            None => self.module_key(params, name)?,
        };
        let caching = !self.registry.lookup(name)?.result_caching_disabled();

        if caching && self.cache.contains(&key, classes::RESULTS) {
            match self.cache.load(&key, classes::RESULTS) {
                Ok(results) => {
                    self.report(params, name, &key, &results)?;
                    return Ok(results);
                }
                // treat as a miss; the recomputed result is written back
                Err(e) => error!("Failed to load cached results for '{}': {}", name, e),
            }
        }

        debug!("Computing results for '{}'", name);
        let instance = match instance {
            Some(instance) => instance,
            None => self.obtain_instance(params, name, &key)?,
        };

        info!("Running {}", name);
        let raw = instance.borrow_mut().run()?;
        let results = freeze_results(raw);

        if caching {
            self.cache.store(&key, classes::RESULTS, results.clone());
            self.report(params, name, &key, &results)?;
        } else {
            // result caching disabled: every request recomputes and
            // re-reports, so the once-per-key guard does not apply
            self.deliver_report(params, name, &results)?;
        }
        instance.borrow_mut().set_local_results(results.clone());

        Ok(results)
    }

    /// Reuse or construct the live instance for a module name
    fn obtain_instance(
        &mut self,
        params: &ParamTree,
        name: &str,
        key: &ModuleKey,
    ) -> RecallResult<SharedInstance> {
        if let Some(live) = self.live.get(name) {
            if &live.key == key {
                debug!("Reusing live instance of '{}'", name);
                return Ok(live.instance.clone());
            }
        }

        debug!("Instantiating module '{}'", name);
        let def = self.registry.lookup(name)?.clone();
        let ctx = ModuleContext {
            key: key.clone(),
            params: params.clone(),
            local: params.branch(name),
        };
        let instance: SharedInstance = Rc::new(RefCell::new(def.instantiate(ctx)?));

        self.live.insert(
            name.to_string(),
            LiveModule {
                key: key.clone(),
                instance: instance.clone(),
            },
        );
        Ok(instance)
    }

    /// Deliver the report callback exactly once per (name, key)
    fn report(
        &mut self,
        params: &ParamTree,
        name: &str,
        key: &ModuleKey,
        results: &Value,
    ) -> RecallResult<()> {
        if self.reported.contains(key) {
            return Ok(());
        }

        debug!("Reporting results for module '{}', key {}", name, key);
        self.deliver_report(params, name, results)?;

        self.reported.insert(key.clone());
        Ok(())
    }

    /// Invoke the report callback with the global tree, the module's own
    /// branch, and the result; callback errors propagate unchanged
    fn deliver_report(&self, params: &ParamTree, name: &str, results: &Value) -> RecallResult<()> {
        let local = params.branch(name);
        let def = self.registry.lookup(name)?;
        def.report_results(params, &local, results)
    }
}

/// Freeze a run's payload, substituting an empty frozen tree for nothing
fn freeze_results(raw: Option<Value>) -> Value {
    match raw {
        Some(Value::Tree(mut t)) => {
            t.freeze();
            Value::Tree(t)
        }
        Some(scalar) => scalar,
        None => {
            let mut empty = ParamTree::new("results");
            empty.freeze();
            Value::Tree(empty)
        }
    }
}

/// Read the default module list from the configuration tree
fn run_queue(params: &ParamTree) -> RecallResult<Vec<String>> {
    match params.get("run_queue") {
        None => Ok(Vec::new()),
        Some(Value::Str(name)) => Ok(vec![name.clone()]),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| match item.as_str() {
                Some(name) => Ok(name.to_string()),
                None => Err(RecallError::RunQueueInvalid(format!("{item:?}"))),
            })
            .collect(),
        Some(other) => Err(RecallError::RunQueueInvalid(format!("{other:?}"))),
    }
}
