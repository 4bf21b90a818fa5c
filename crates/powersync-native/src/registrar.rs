//! The registration state machine.
//!
//! ```text
//! Unloaded --(first register())--> Loaded | Failed(code)
//! Loaded | Failed --(register())--> unchanged, same code
//! ```
//!
//! The first caller performs the transition while holding the state lock, so
//! concurrent first callers wait for it and then read the same terminal code.

use crate::config::RegistrarConfig;
use crate::dependency::{DependencyPlan, LibraryDependency};
use crate::error::{RegistrarError, ResponseCode, Result};
use crate::loader::{DynamicLoader, ExtensionLoader};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Outcome of native registration for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum RegistrationState {
    Unloaded,
    Loaded,
    Failed(i32),
}

impl RegistrationState {
    /// The response code of a terminal state, `None` while unloaded.
    pub fn response_code(&self) -> Option<i32> {
        match self {
            RegistrationState::Unloaded => None,
            RegistrationState::Loaded => Some(ResponseCode::SUCCESS),
            RegistrationState::Failed(code) => Some(*code),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RegistrationState::Unloaded)
    }
}

/// Snapshot of a registrar for hosts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub state: RegistrationState,
    pub response_code: Option<i32>,
    /// Dependencies in load order.
    pub planned: Vec<String>,
    /// Dependencies loaded successfully.
    pub loaded: Vec<String>,
    pub failed_dependency: Option<String>,
    pub message: Option<String>,
    /// RFC 3339 time the terminal state was reached.
    pub completed_at: Option<String>,
}

#[derive(Debug)]
struct Registration {
    state: RegistrationState,
    loaded: Vec<String>,
    failure: Option<(String, String)>,
    completed_at: Option<String>,
}

impl Registration {
    fn new() -> Self {
        Self {
            state: RegistrationState::Unloaded,
            loaded: Vec::new(),
            failure: None,
            completed_at: None,
        }
    }

    fn complete(&mut self, state: RegistrationState) {
        self.state = state;
        self.completed_at = Some(Utc::now().to_rfc3339());
    }
}

/// Loads a [`DependencyPlan`] at most once and remembers the outcome.
pub struct Registrar<L = DynamicLoader> {
    plan: DependencyPlan,
    loader: L,
    registration: Mutex<Registration>,
}

impl Registrar<DynamicLoader> {
    /// Create a builder for a registrar.
    pub fn builder() -> RegistrarBuilder {
        RegistrarBuilder::new()
    }
}

impl<L: ExtensionLoader> Registrar<L> {
    pub fn new(plan: DependencyPlan, loader: L) -> Self {
        Self {
            plan,
            loader,
            registration: Mutex::new(Registration::new()),
        }
    }

    /// Load every dependency in plan order, once.
    ///
    /// Returns `0` when all dependencies loaded, otherwise the nonzero code of
    /// the first failure. Loading stops at the first failure. Every later call
    /// returns the stored code without touching the loader.
    pub fn register(&self) -> i32 {
        let mut registration = self.lock_registration();
        if let Some(code) = registration.state.response_code() {
            debug!("Native libraries already registered (code {})", code);
            return code;
        }

        info!(
            "Registering native libraries: {}",
            self.plan.names().join(", ")
        );

        for dependency in &self.plan {
            match self.load_one(dependency) {
                Ok(()) => registration.loaded.push(dependency.name.clone()),
                Err(e) => {
                    let code = e.response_code();
                    error!(
                        "Native registration failed at {} (code {}): {}",
                        dependency.name, code, e
                    );
                    registration.failure = Some((dependency.name.clone(), e.to_string()));
                    registration.complete(RegistrationState::Failed(code));
                    return code;
                }
            }
        }

        registration.complete(RegistrationState::Loaded);
        info!("Native registration complete");
        ResponseCode::SUCCESS
    }

    fn load_one(&self, dependency: &LibraryDependency) -> Result<()> {
        panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(dependency))).unwrap_or_else(
            |_| {
                Err(RegistrarError::LoaderPanicked {
                    name: dependency.name.clone(),
                })
            },
        )
    }

    pub fn state(&self) -> RegistrationState {
        self.lock_registration().state
    }

    pub fn report(&self) -> RegistrationReport {
        let registration = self.lock_registration();
        let (failed_dependency, message) = match registration.failure {
            Some((ref name, ref message)) => (Some(name.clone()), Some(message.clone())),
            None => (None, None),
        };

        RegistrationReport {
            state: registration.state,
            response_code: registration.state.response_code(),
            planned: self.plan.names().into_iter().map(String::from).collect(),
            loaded: registration.loaded.clone(),
            failed_dependency,
            message,
            completed_at: registration.completed_at.clone(),
        }
    }

    pub fn plan(&self) -> &DependencyPlan {
        &self.plan
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    // The guarded state is replaced in a single assignment, so a poisoned lock
    // still holds a consistent value.
    fn lock_registration(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Anything that can ensure native registration before a connection opens.
pub trait RegistrationGate: Send + Sync {
    /// Register if needed and return the response code.
    fn ensure_registered(&self) -> i32;
}

impl<L: ExtensionLoader> RegistrationGate for Registrar<L> {
    fn ensure_registered(&self) -> i32 {
        self.register()
    }
}

impl<G: RegistrationGate + ?Sized> RegistrationGate for Arc<G> {
    fn ensure_registered(&self) -> i32 {
        (**self).ensure_registered()
    }
}

/// Builder for [`Registrar`].
///
/// Without explicit dependencies the plan for the build's link mode is used.
#[derive(Debug, Clone)]
pub struct RegistrarBuilder {
    dependencies: Vec<LibraryDependency>,
    search_dirs: Vec<PathBuf>,
    search_dirs_from_env: bool,
    system_fallback: bool,
}

impl RegistrarBuilder {
    pub fn new() -> Self {
        Self {
            dependencies: Vec::new(),
            search_dirs: Vec::new(),
            search_dirs_from_env: true,
            system_fallback: true,
        }
    }

    /// Add a dependency. The first call replaces the default plan.
    pub fn dependency(mut self, dependency: LibraryDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn dependencies(mut self, dependencies: impl IntoIterator<Item = LibraryDependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Add a library search directory, tried before the environment's.
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Whether to append directories from `POWERSYNC_NATIVE_LIB_DIR` (default: true).
    pub fn search_dirs_from_env(mut self, enabled: bool) -> Self {
        self.search_dirs_from_env = enabled;
        self
    }

    /// Whether to fall back to the system library search path (default: true).
    pub fn system_fallback(mut self, enabled: bool) -> Self {
        self.system_fallback = enabled;
        self
    }

    fn plan(&self) -> Result<DependencyPlan> {
        if self.dependencies.is_empty() {
            Ok(DependencyPlan::default())
        } else {
            DependencyPlan::new(self.dependencies.clone())
        }
    }

    fn resolved_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.search_dirs.clone();
        if self.search_dirs_from_env {
            dirs.extend(RegistrarConfig::search_dirs_from_env());
        }
        dirs
    }

    /// Build a registrar backed by [`DynamicLoader`].
    pub fn build(self) -> Result<Registrar<DynamicLoader>> {
        let loader = DynamicLoader::new(self.resolved_search_dirs())
            .with_system_fallback(self.system_fallback);
        self.build_with(loader)
    }

    /// Build a registrar with a custom loader. Search settings are ignored.
    pub fn build_with<L: ExtensionLoader>(self, loader: L) -> Result<Registrar<L>> {
        let plan = self.plan()?;
        Ok(Registrar::new(plan, loader))
    }
}

impl Default for RegistrarBuilder {
    fn default() -> Self {
        Self::new()
    }
}
