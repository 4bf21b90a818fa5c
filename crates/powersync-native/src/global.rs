//! The process-wide registrar behind [`register_core`].

use crate::config::RegistrarConfig;
use crate::dependency::DependencyPlan;
use crate::error::{RegistrarError, Result};
use crate::loader::DynamicLoader;
use crate::registrar::{
    Registrar, RegistrarBuilder, RegistrationGate, RegistrationReport, RegistrationState,
};
use std::sync::OnceLock;
use tracing::debug;

static CORE: OnceLock<Registrar<DynamicLoader>> = OnceLock::new();

fn core() -> &'static Registrar<DynamicLoader> {
    CORE.get_or_init(|| {
        debug!("Initializing process registrar with default configuration");
        Registrar::new(
            DependencyPlan::default(),
            DynamicLoader::new(RegistrarConfig::search_dirs_from_env()),
        )
    })
}

/// Install a custom process-wide registrar.
///
/// Must run before the first [`register_core`]; afterwards the configuration
/// is fixed and [`RegistrarError::AlreadyConfigured`] is returned.
pub fn configure_core(builder: RegistrarBuilder) -> Result<()> {
    if CORE.get().is_some() {
        return Err(RegistrarError::AlreadyConfigured);
    }
    let registrar = builder.build()?;
    CORE.set(registrar)
        .map_err(|_| RegistrarError::AlreadyConfigured)
}

/// Load the native extensions once per process and return the response code.
///
/// `0` means success; any other value is the failure code recorded by the
/// first call, returned unchanged by every later call.
pub fn register_core() -> i32 {
    core().register()
}

/// State of the process-wide registrar. Never installs or registers it.
pub fn core_state() -> RegistrationState {
    CORE.get()
        .map_or(RegistrationState::Unloaded, Registrar::state)
}

/// Report of the process-wide registrar.
///
/// Before anything is installed this describes the default plan in the
/// `Unloaded` state, and [`configure_core`] remains available.
pub fn core_report() -> RegistrationReport {
    match CORE.get() {
        Some(registrar) => registrar.report(),
        None => RegistrationReport {
            state: RegistrationState::Unloaded,
            response_code: None,
            planned: DependencyPlan::default()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            loaded: Vec::new(),
            failed_dependency: None,
            message: None,
            completed_at: None,
        },
    }
}

/// [`RegistrationGate`] backed by the process-wide registrar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCore;

impl RegistrationGate for ProcessCore {
    fn ensure_registered(&self) -> i32 {
        register_core()
    }
}
