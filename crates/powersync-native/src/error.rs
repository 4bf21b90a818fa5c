//! Error types for the native extension registrar.
//!
//! Every failure the registrar can observe is eventually flattened into a
//! nonzero response code for the host; [`RegistrarError::response_code`] owns
//! that mapping.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the registrar.
#[derive(Debug, Error)]
pub enum RegistrarError {
    // Loading errors
    #[error("Native library {name} not found (searched {searched:?})")]
    LibraryNotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to load native library {name}: {message}")]
    LoadFailed {
        name: String,
        message: String,
        /// OS error code when the platform reports one (Windows `GetLastError`)
        os_code: Option<i32>,
    },

    #[error("Symbol {symbol} not found in {library}")]
    SymbolNotFound { library: String, symbol: String },

    #[error("Extension entry point of {library} failed to register (SQLite code {code})")]
    ExtensionInit { library: String, code: i32 },

    #[error("Loader panicked while loading {name}")]
    LoaderPanicked { name: String },

    // Plan errors
    #[error("Duplicate dependency: {name}")]
    DuplicateDependency { name: String },

    #[error("Dependency {name} requires unknown dependency {requires}")]
    UnknownDependency { name: String, requires: String },

    #[error("Dependency cycle involving: {}", .names.join(", "))]
    DependencyCycle { names: Vec<String> },

    #[error("Invalid dependency plan: {message}")]
    InvalidPlan { message: String },

    // Lifecycle errors
    #[error("Native registration failed with code {code}")]
    RegistrationFailed { code: i32 },

    #[error("The process-wide registrar is already configured")]
    AlreadyConfigured,

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for registrar operations.
pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Response codes surfaced across the plugin boundary.
///
/// SQLite result codes from extension initialization and Windows loader codes
/// are passed through unchanged; the constants below cover everything else.
pub struct ResponseCode;

impl ResponseCode {
    pub const SUCCESS: i32 = 0;
    pub const LIBRARY_NOT_FOUND: i32 = 1001;
    pub const LOAD_FAILED: i32 = 1002;
    pub const SYMBOL_NOT_FOUND: i32 = 1003;
    pub const INVALID_PLAN: i32 = 1004;
    pub const LOADER_PANICKED: i32 = 1005;
    pub const INTERNAL: i32 = 1099;
}

impl From<std::io::Error> for RegistrarError {
    fn from(err: std::io::Error) -> Self {
        RegistrarError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for RegistrarError {
    fn from(err: rusqlite::Error) -> Self {
        RegistrarError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RegistrarError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RegistrarError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to the nonzero response code reported to the host.
    ///
    /// Never returns [`ResponseCode::SUCCESS`]: a zero OS or SQLite code is
    /// replaced by the generic code for its category.
    pub fn response_code(&self) -> i32 {
        let code = match self {
            RegistrarError::LibraryNotFound { .. } => ResponseCode::LIBRARY_NOT_FOUND,

            RegistrarError::LoadFailed { os_code, .. } => {
                os_code.unwrap_or(ResponseCode::LOAD_FAILED)
            }

            RegistrarError::SymbolNotFound { .. } => ResponseCode::SYMBOL_NOT_FOUND,

            RegistrarError::ExtensionInit { code, .. } => *code,

            RegistrarError::LoaderPanicked { .. } => ResponseCode::LOADER_PANICKED,

            RegistrarError::DuplicateDependency { .. }
            | RegistrarError::UnknownDependency { .. }
            | RegistrarError::DependencyCycle { .. }
            | RegistrarError::InvalidPlan { .. } => ResponseCode::INVALID_PLAN,

            RegistrarError::RegistrationFailed { code } => *code,

            RegistrarError::AlreadyConfigured
            | RegistrarError::Database { .. }
            | RegistrarError::Io { .. }
            | RegistrarError::Config { .. }
            | RegistrarError::Other(_) => ResponseCode::INTERNAL,
        };

        if code == ResponseCode::SUCCESS {
            self.fallback_code()
        } else {
            code
        }
    }

    fn fallback_code(&self) -> i32 {
        match self {
            RegistrarError::LoadFailed { .. } => ResponseCode::LOAD_FAILED,
            _ => ResponseCode::INTERNAL,
        }
    }
}
