//! Integration tests for the registration contract.
//!
//! A counting loader stands in for the OS loader so the "load at most once"
//! and ordering guarantees can be observed directly.

use powersync_native::{
    DependencyPlan, ExtensionLoader, LibraryDependency, Registrar, RegistrarError,
    RegistrationState, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

/// Counts load attempts per dependency; optionally fails one dependency.
#[derive(Default)]
struct CountingLoader {
    attempts: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    fail: Option<(String, i32)>,
    delay: Option<Duration>,
}

impl CountingLoader {
    fn failing_on(name: &str, code: i32) -> Self {
        Self {
            fail: Some((name.to_string(), code)),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn attempts(&self, name: &str) -> usize {
        self.attempts.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl ExtensionLoader for CountingLoader {
    fn load(&self, dependency: &LibraryDependency) -> Result<()> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(dependency.name.clone())
            .or_default() += 1;

        match self.fail {
            Some((ref name, code)) if name == &dependency.name => Err(RegistrarError::LoadFailed {
                name: name.clone(),
                message: "simulated load failure".to_string(),
                os_code: Some(code),
            }),
            _ => Ok(()),
        }
    }
}

fn registrar_with(loader: CountingLoader) -> (Registrar<Arc<CountingLoader>>, Arc<CountingLoader>) {
    let loader = Arc::new(loader);
    let registrar = Registrar::new(DependencyPlan::dynamic_default(), loader.clone());
    (registrar, loader)
}

#[test]
fn test_repeated_calls_return_identical_result_and_load_once() {
    for calls in [1usize, 2, 10, 100] {
        let (registrar, loader) = registrar_with(CountingLoader::default());

        let results: Vec<i32> = (0..calls).map(|_| registrar.register()).collect();

        assert!(results.iter().all(|&code| code == results[0]));
        assert_eq!(loader.attempts("sqlcipher"), 1);
        assert_eq!(loader.attempts("powersync"), 1);
    }
}

#[test]
fn test_both_dependencies_load_returns_zero_every_call() {
    let (registrar, loader) = registrar_with(CountingLoader::default());

    for _ in 0..5 {
        assert_eq!(registrar.register(), 0);
    }
    assert_eq!(registrar.state(), RegistrationState::Loaded);
    assert_eq!(loader.total(), 2);
}

#[test]
fn test_encryption_failure_never_attempts_engine() {
    let (registrar, loader) = registrar_with(CountingLoader::failing_on("sqlcipher", 126));

    for _ in 0..5 {
        assert_eq!(registrar.register(), 126);
    }
    assert_eq!(registrar.state(), RegistrationState::Failed(126));
    assert_eq!(loader.attempts("sqlcipher"), 1);
    assert_eq!(loader.attempts("powersync"), 0);

    let report = registrar.report();
    assert!(report.loaded.is_empty());
    assert_eq!(report.failed_dependency.as_deref(), Some("sqlcipher"));
}

#[test]
fn test_engine_failure_after_encryption_loaded() {
    let (registrar, loader) = registrar_with(CountingLoader::failing_on("powersync", 193));

    assert_eq!(registrar.register(), 193);
    assert_eq!(registrar.register(), 193);
    assert_eq!(loader.attempts("sqlcipher"), 1);
    assert_eq!(loader.attempts("powersync"), 1);
    assert_eq!(registrar.report().loaded, vec!["sqlcipher"]);
}

#[test]
fn test_concurrent_first_calls_load_once() {
    const CALLERS: usize = 16;

    let (registrar, loader) = registrar_with(CountingLoader::slow(Duration::from_millis(20)));
    let registrar = Arc::new(registrar);
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let registrar = registrar.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registrar.register()
            })
        })
        .collect();

    let codes: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(codes.iter().all(|&code| code == 0));
    assert_eq!(loader.attempts("sqlcipher"), 1);
    assert_eq!(loader.attempts("powersync"), 1);
}

#[test]
fn test_concurrent_first_calls_observe_same_failure() {
    const CALLERS: usize = 16;

    let mut loader = CountingLoader::failing_on("sqlcipher", 1002);
    loader.delay = Some(Duration::from_millis(20));
    let (registrar, loader) = registrar_with(loader);
    let registrar = Arc::new(registrar);
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let registrar = registrar.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registrar.register()
            })
        })
        .collect();

    let codes: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(codes.iter().all(|&code| code == 1002));
    assert_eq!(loader.total(), 1);
    assert_eq!(loader.attempts("powersync"), 0);
}

#[test]
fn test_custom_plan_respects_required_before() {
    let loader = Arc::new(CountingLoader::failing_on("crypto", 9));
    let plan = DependencyPlan::new(vec![
        LibraryDependency::new("engine").requires("crypto"),
        LibraryDependency::new("crypto"),
    ])
    .unwrap();
    let registrar = Registrar::new(plan, loader.clone());

    assert_eq!(registrar.register(), 9);
    assert_eq!(loader.attempts("engine"), 0);
}
