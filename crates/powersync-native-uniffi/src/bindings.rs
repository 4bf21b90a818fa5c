use powersync_native::{RegistrarError, RegistrationReport, RegistrationState};
use serde::Serialize;

// =============================================================================
// FfiError: simplified error type for the FFI boundary
// =============================================================================

/// FFI-friendly error type.
///
/// This is a simplified version of `RegistrarError` that can cross the FFI
/// boundary. Embedded `std::io::Error` and `rusqlite::Error` sources are
/// converted to string representations.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Error, thiserror::Error)]
pub enum FfiError {
    #[error("Load error: {message}")]
    Load { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid dependency plan: {message}")]
    Plan { message: String },

    #[error("Registration failed with code {code}")]
    Registration { code: i32 },

    #[error("Already configured")]
    AlreadyConfigured,

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl From<RegistrarError> for FfiError {
    fn from(err: RegistrarError) -> Self {
        match err {
            RegistrarError::LibraryNotFound { name, .. } => FfiError::NotFound {
                resource: format!("Native library: {}", name),
            },
            RegistrarError::SymbolNotFound { library, symbol } => FfiError::NotFound {
                resource: format!("Symbol {} in {}", symbol, library),
            },
            err @ (RegistrarError::LoadFailed { .. }
            | RegistrarError::ExtensionInit { .. }
            | RegistrarError::LoaderPanicked { .. }) => FfiError::Load {
                message: err.to_string(),
            },
            err @ (RegistrarError::DuplicateDependency { .. }
            | RegistrarError::UnknownDependency { .. }
            | RegistrarError::DependencyCycle { .. }
            | RegistrarError::InvalidPlan { .. }) => FfiError::Plan {
                message: err.to_string(),
            },
            RegistrarError::RegistrationFailed { code } => FfiError::Registration { code },
            RegistrarError::AlreadyConfigured => FfiError::AlreadyConfigured,
            RegistrarError::Database { message, .. } => FfiError::Database { message },
            RegistrarError::Io { message, .. } => FfiError::Io { message },
            RegistrarError::Config { message } => FfiError::Config { message },
            RegistrarError::Other(message) => FfiError::Other { message },
        }
    }
}

// =============================================================================
// FFI Wrapper Types
// =============================================================================

/// Reply returned to the host plugin framework.
///
/// Serializes as `{"responseCode": <code>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCoreResponse {
    pub response_code: i32,
}

impl RegisterCoreResponse {
    pub fn is_success(&self) -> bool {
        self.response_code == 0
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "responseCode": self.response_code }).to_string()
    }
}

/// Registration state as seen by foreign code.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum FfiRegistrationState {
    Unloaded,
    Loaded,
    Failed { code: i32 },
}

impl From<RegistrationState> for FfiRegistrationState {
    fn from(state: RegistrationState) -> Self {
        match state {
            RegistrationState::Unloaded => FfiRegistrationState::Unloaded,
            RegistrationState::Loaded => FfiRegistrationState::Loaded,
            RegistrationState::Failed(code) => FfiRegistrationState::Failed { code },
        }
    }
}

/// Diagnostic snapshot of the process registrar.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiRegistrationStatus {
    pub state: FfiRegistrationState,
    pub response_code: Option<i32>,
    pub planned: Vec<String>,
    pub loaded: Vec<String>,
    pub failed_dependency: Option<String>,
    pub message: Option<String>,
    pub completed_at: Option<String>,
}

impl From<RegistrationReport> for FfiRegistrationStatus {
    fn from(report: RegistrationReport) -> Self {
        Self {
            state: report.state.into(),
            response_code: report.response_code,
            planned: report.planned,
            loaded: report.loaded,
            failed_dependency: report.failed_dependency,
            message: report.message,
            completed_at: report.completed_at,
        }
    }
}

// =============================================================================
// Exported functions
// =============================================================================

/// Get the version of the powersync-native-uniffi bindings.
#[uniffi::export]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Load the native extensions once per process. `0` means success.
#[uniffi::export]
pub fn register_core() -> i32 {
    powersync_native::register_core()
}

/// Same as [`register_core`], wrapped in the reply record.
#[uniffi::export]
pub fn register_core_response() -> RegisterCoreResponse {
    RegisterCoreResponse {
        response_code: register_core(),
    }
}

/// Current state of the process registrar.
///
/// Neither registers nor installs the registrar, so [`configure_library_dir`]
/// still works afterwards.
#[uniffi::export]
pub fn registration_status() -> FfiRegistrationStatus {
    powersync_native::core_report().into()
}

/// Add `path` as the first library search directory.
///
/// Only valid before the first registration.
#[uniffi::export]
pub fn configure_library_dir(path: String) -> Result<(), FfiError> {
    if path.trim().is_empty() {
        return Err(FfiError::Config {
            message: "Library directory must not be empty".to_string(),
        });
    }
    powersync_native::configure_core(powersync_native::Registrar::builder().search_dir(path))
        .map_err(FfiError::from)
}
