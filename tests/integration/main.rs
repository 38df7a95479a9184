//! Integration tests for recall

mod support {
    use recall::{
        DependencyKind, Module, ModuleContext, ModuleInstance, ParamTree, RecallError,
        RecallResult, Settings, Value,
    };
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Once};

    /// Install a test subscriber once; set RUST_LOG to see engine logs
    pub fn init_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    /// A module returning a fixed payload, counting runs and reports
    pub struct TestModule {
        result: Value,
        param_deps: Vec<String>,
        result_deps: Vec<String>,
        caching_disabled: bool,
        failing_report: bool,
        pub runs: Arc<AtomicUsize>,
        pub reports: Arc<AtomicUsize>,
    }

    impl TestModule {
        pub fn new(result: Value) -> Self {
            Self {
                result,
                param_deps: Vec::new(),
                result_deps: Vec::new(),
                caching_disabled: false,
                failing_report: false,
                runs: Arc::new(AtomicUsize::new(0)),
                reports: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn result_deps(mut self, deps: &[&str]) -> Self {
            self.result_deps = deps.iter().map(|s| s.to_string()).collect();
            // a dependency's branch feeds the key through the closure, so
            // list it among the parameter dependencies as modules do
            self.param_deps = deps.iter().map(|s| s.to_string()).collect();
            self
        }

        pub fn caching_disabled(mut self) -> Self {
            self.caching_disabled = true;
            self
        }

        pub fn failing_report(mut self) -> Self {
            self.failing_report = true;
            self
        }
    }

    impl Module for TestModule {
        fn dependencies(&self, kind: DependencyKind) -> BTreeSet<String> {
            let names = match kind {
                DependencyKind::Parameter => &self.param_deps,
                DependencyKind::Result => &self.result_deps,
                DependencyKind::Module => return BTreeSet::new(),
            };
            names.iter().cloned().collect()
        }

        fn instantiate(&self, _ctx: ModuleContext) -> RecallResult<Box<dyn ModuleInstance>> {
            Ok(Box::new(TestInstance {
                result: self.result.clone(),
                runs: self.runs.clone(),
            }))
        }

        fn report_results(
            &self,
            _params: &ParamTree,
            _local: &ParamTree,
            _results: &Value,
        ) -> RecallResult<()> {
            if self.failing_report {
                return Err(RecallError::module_failed("test", "report exploded"));
            }
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn result_caching_disabled(&self) -> bool {
            self.caching_disabled
        }
    }

    struct TestInstance {
        result: Value,
        runs: Arc<AtomicUsize>,
    }

    impl ModuleInstance for TestInstance {
        fn run(&mut self) -> RecallResult<Option<Value>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.result.clone()))
        }
    }

    pub fn disk_settings(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.cache.dir = Some(dir.to_path_buf());
        settings
    }

    pub fn tree_result(score: i64) -> Value {
        let mut t = ParamTree::new("out");
        t.set("score", score).expect("fresh tree accepts entries");
        Value::Tree(t)
    }

    pub fn count(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

mod engine_tests {
    use crate::support::*;
    use recall::{
        Engine, EvictionPolicy, ModuleRegistry, ParamTree, RecallError, ResultsRequest, Settings,
        Value,
    };
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn run_queue_scenario_computes_persists_then_loads() {
        init_logging();
        let dir = tempfile::TempDir::new().unwrap();

        let mut params = ParamTree::new("root");
        params
            .set("run_queue", vec![Value::from("alpha")])
            .unwrap();
        params.set("alpha.threshold", 3i64).unwrap();

        // first process: computes and persists
        let alpha = Arc::new(TestModule::new(tree_result(7)));
        let (runs, reports) = (alpha.runs.clone(), alpha.reports.clone());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));

        let results = engine.get_results(&params, ResultsRequest::Default).unwrap();
        assert!(results.is_frozen());
        assert_eq!(
            results.get("alpha.score").and_then(|v| v.as_int()),
            Some(7)
        );
        assert_eq!(count(&runs), 1);
        assert_eq!(count(&reports), 1);

        // the results file sits at root/alpha/results/<local>-<dep>.cache
        let key = engine.module_key(&params.copy(), "alpha").unwrap();
        let file = dir
            .path()
            .join("alpha")
            .join("results")
            .join(format!("{}-{}.cache", key.local_hash(), key.dependency_hash()));
        assert!(file.is_file());

        // second process: same configuration, fresh engine and counters
        let alpha2 = Arc::new(TestModule::new(tree_result(7)));
        let (runs2, reports2) = (alpha2.runs.clone(), alpha2.reports.clone());
        let mut registry2 = ModuleRegistry::new();
        registry2.register("alpha", alpha2).unwrap();
        let mut engine2 = Engine::new(registry2, &disk_settings(dir.path()));

        let results2 = engine2.get_results(&params, ResultsRequest::Default).unwrap();
        assert_eq!(results2, results);
        assert_eq!(count(&runs2), 0, "disk hit must not execute the module");
        assert_eq!(count(&reports2), 1, "report still fires once per process");
    }

    #[test]
    fn cache_hit_short_circuits_and_reports_once() {
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let (runs, reports) = (alpha.runs.clone(), alpha.reports.clone());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();
        engine.get_results(&params, "alpha").unwrap();

        assert_eq!(count(&runs), 1);
        assert_eq!(count(&reports), 1);
    }

    #[test]
    fn duplicate_request_names_compute_once() {
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let runs = alpha.runs.clone();
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        let results = engine
            .get_results(
                &params,
                vec!["alpha".to_string(), "ALPHA".to_string()],
            )
            .unwrap();

        assert_eq!(count(&runs), 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn results_mapping_preserves_request_order() {
        let mut registry = ModuleRegistry::new();
        registry
            .register("zeta", Arc::new(TestModule::new(tree_result(1))))
            .unwrap();
        registry
            .register("alpha", Arc::new(TestModule::new(tree_result(2))))
            .unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        let results = engine
            .get_results(&params, vec!["zeta".to_string(), "alpha".to_string()])
            .unwrap();

        let order: Vec<&str> = results.entries().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["zeta", "alpha"]);
    }

    #[test]
    fn global_slot_eviction_without_disk_forces_recompute() {
        // memory-only cache: storing beta's result evicts alpha's
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let beta = Arc::new(TestModule::new(tree_result(2)));
        let (alpha_runs, beta_runs) = (alpha.runs.clone(), beta.runs.clone());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        registry.register("beta", beta).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();
        engine.get_results(&params, "beta").unwrap();

        // beta is resident, alpha was evicted
        engine.get_results(&params, "beta").unwrap();
        assert_eq!(count(&beta_runs), 1);
        engine.get_results(&params, "alpha").unwrap();
        assert_eq!(count(&alpha_runs), 2);
    }

    #[test]
    fn unbounded_policy_keeps_both_results_resident() {
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let beta = Arc::new(TestModule::new(tree_result(2)));
        let (alpha_runs, beta_runs) = (alpha.runs.clone(), beta.runs.clone());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        registry.register("beta", beta).unwrap();

        let mut settings = Settings::default();
        settings.cache.eviction = EvictionPolicy::Unbounded;
        let mut engine = Engine::new(registry, &settings);

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();
        engine.get_results(&params, "beta").unwrap();
        engine.get_results(&params, "alpha").unwrap();
        engine.get_results(&params, "beta").unwrap();

        assert_eq!(count(&alpha_runs), 1);
        assert_eq!(count(&beta_runs), 1);
    }

    #[test]
    fn disabled_caching_recomputes_and_rereports() {
        let alpha = Arc::new(TestModule::new(tree_result(1)).caching_disabled());
        let (runs, reports) = (alpha.runs.clone(), alpha.reports.clone());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();
        engine.get_results(&params, "alpha").unwrap();

        assert_eq!(count(&runs), 2);
        assert_eq!(count(&reports), 2);
        // nothing was written to disk either
        assert!(!dir.path().join("alpha").exists());
    }

    #[test]
    fn configuration_change_recomputes_and_old_key_stays_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let runs = alpha.runs.clone();
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));

        let mut p1 = ParamTree::new("root");
        p1.set("alpha.x", 1i64).unwrap();
        let mut p2 = ParamTree::new("root");
        p2.set("alpha.x", 2i64).unwrap();

        engine.get_results(&p1, "alpha").unwrap();
        engine.get_results(&p2, "alpha").unwrap();
        assert_eq!(count(&runs), 2);

        // first configuration again: answered from disk, not recomputed
        engine.get_results(&p1, "alpha").unwrap();
        assert_eq!(count(&runs), 2);
    }

    #[test]
    fn dependency_change_invalidates_dependent_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let top = Arc::new(TestModule::new(tree_result(1)).result_deps(&["leaf"]));
        let leaf = Arc::new(TestModule::new(tree_result(2)));
        let top_runs = top.runs.clone();
        let mut registry = ModuleRegistry::new();
        registry.register("top", top).unwrap();
        registry.register("leaf", leaf).unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));

        let mut p1 = ParamTree::new("root");
        p1.set("leaf.y", 1i64).unwrap();
        let mut p2 = ParamTree::new("root");
        p2.set("leaf.y", 2i64).unwrap();

        engine.get_results(&p1, "top").unwrap();
        engine.get_results(&p2, "top").unwrap();

        assert_eq!(count(&top_runs), 2, "leaf branch change must move top's key");
    }

    #[test]
    fn dependency_cycle_is_reported_not_overflowed() {
        let a = Arc::new(TestModule::new(tree_result(1)).result_deps(&["b"]));
        let b = Arc::new(TestModule::new(tree_result(2)).result_deps(&["a"]));
        let mut registry = ModuleRegistry::new();
        registry.register("a", a).unwrap();
        registry.register("b", b).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        let err = engine.get_results(&params, "a").unwrap_err();
        assert!(matches!(err, RecallError::DependencyCycle { .. }));
    }

    #[test]
    fn unknown_module_is_an_error() {
        let mut engine = Engine::new(ModuleRegistry::new(), &Settings::default());
        let params = ParamTree::new("root");

        let err = engine.get_results(&params, "ghost").unwrap_err();
        assert!(matches!(err, RecallError::ModuleNotFound(_)));
    }

    #[test]
    fn report_error_propagates_unchanged() {
        let alpha = Arc::new(TestModule::new(tree_result(1)).failing_report());
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let params = ParamTree::new("root");
        let err = engine.get_results(&params, "alpha").unwrap_err();
        match err {
            RecallError::ModuleFailed { reason, .. } => assert_eq!(reason, "report exploded"),
            other => panic!("expected the callback's own error, got {other:?}"),
        }
    }

    #[test]
    fn get_module_reuses_instance_while_key_is_stable() {
        let alpha = Arc::new(TestModule::new(tree_result(1)));
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &Settings::default());

        let mut params = ParamTree::new("root");
        params.set("alpha.x", 1i64).unwrap();

        let first = engine.get_module(&params, "alpha").unwrap();
        let second = engine.get_module(&params, "alpha").unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        // a changed branch derives a new key and replaces the instance
        params.set("alpha.x", 2i64).unwrap();
        let third = engine.get_module(&params, "alpha").unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
    }
}

mod disk_tests {
    use crate::support::*;
    use recall::{classes, Engine, ModuleKey, ModuleRegistry, ParamTree, Settings, Value};
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn scalar_results_round_trip_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();

        let alpha = Arc::new(TestModule::new(Value::Int(42)));
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();

        let alpha2 = Arc::new(TestModule::new(Value::Int(0)));
        let runs2 = alpha2.runs.clone();
        let mut registry2 = ModuleRegistry::new();
        registry2.register("alpha", alpha2).unwrap();
        let mut engine2 = Engine::new(registry2, &disk_settings(dir.path()));

        let results = engine2.get_results(&params, "alpha").unwrap();
        assert_eq!(count(&runs2), 0);
        assert_eq!(results.get("alpha").and_then(|v| v.as_int()), Some(42));
    }

    #[test]
    fn read_only_mode_reads_but_never_writes() {
        let dir = tempfile::TempDir::new().unwrap();

        let alpha = Arc::new(TestModule::new(tree_result(5)));
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();

        let mut settings = disk_settings(dir.path());
        settings.cache.read_only = true;
        let mut engine = Engine::new(registry, &settings);

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();

        assert!(!dir.path().join("alpha").exists());
    }

    #[test]
    fn corrupt_cache_file_falls_back_to_recomputation() {
        init_logging();
        let dir = tempfile::TempDir::new().unwrap();

        let mut params = ParamTree::new("root");
        params.set("alpha.x", 1i64).unwrap();

        // compute once to learn the file path, then corrupt it
        let alpha = Arc::new(TestModule::new(tree_result(9)));
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &disk_settings(dir.path()));
        engine.get_results(&params, "alpha").unwrap();

        let key = engine.module_key(&params.copy(), "alpha").unwrap();
        let file = dir
            .path()
            .join("alpha")
            .join(classes::RESULTS)
            .join(format!("{}.cache", key.file_stem()));
        fs::write(&file, b"corrupted").unwrap();

        let alpha2 = Arc::new(TestModule::new(tree_result(9)));
        let (runs2, reports2) = (alpha2.runs.clone(), alpha2.reports.clone());
        let mut registry2 = ModuleRegistry::new();
        registry2.register("alpha", alpha2).unwrap();
        let mut engine2 = Engine::new(registry2, &disk_settings(dir.path()));

        let results = engine2.get_results(&params, "alpha").unwrap();
        assert_eq!(count(&runs2), 1, "corrupt file must be treated as a miss");
        assert_eq!(count(&reports2), 1);
        assert_eq!(results.get("alpha.score").and_then(|v| v.as_int()), Some(9));

        // the recomputation wrote a valid file back
        let alpha3 = Arc::new(TestModule::new(tree_result(9)));
        let runs3 = alpha3.runs.clone();
        let mut registry3 = ModuleRegistry::new();
        registry3.register("alpha", alpha3).unwrap();
        let mut engine3 = Engine::new(registry3, &disk_settings(dir.path()));
        engine3.get_results(&params, "alpha").unwrap();
        assert_eq!(count(&runs3), 0);
    }

    #[test]
    fn ancillary_blobs_store_under_overridden_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut engine = Engine::new(ModuleRegistry::new(), &disk_settings(dir.path()));

        let key = ModuleKey::new("alpha", "aaaaaaaaaaaa", "bbbbbbbbbbbb");
        let variant = key.with_overrides(Some("cccccccccccc"), None);

        engine.save_to_cache(&variant, classes::DATABASE, Value::Int(7));

        assert!(engine.in_cache(&variant, classes::DATABASE));
        assert!(!engine.in_cache(&key, classes::DATABASE));
        assert_eq!(
            engine.load_from_cache(&variant, classes::DATABASE).unwrap(),
            Value::Int(7)
        );
        assert!(dir
            .path()
            .join("alpha")
            .join(classes::DATABASE)
            .join("cccccccccccc-bbbbbbbbbbbb.cache")
            .is_file());
    }

    #[test]
    fn settings_file_configures_the_engine() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache_dir = dir.path().join("store");
        let settings_path = dir.path().join("settings.toml");
        fs::write(
            &settings_path,
            format!("[cache]\ndir = \"{}\"\n", cache_dir.display()),
        )
        .unwrap();

        let settings = Settings::load_from_file(&settings_path).unwrap();
        let alpha = Arc::new(TestModule::new(tree_result(3)));
        let mut registry = ModuleRegistry::new();
        registry.register("alpha", alpha).unwrap();
        let mut engine = Engine::new(registry, &settings);

        let params = ParamTree::new("root");
        engine.get_results(&params, "alpha").unwrap();

        assert!(cache_dir.join("alpha").join("results").is_dir());
    }
}
