//! PowerSync Native - loads the SQLite extensions a PowerSync database needs.
//!
//! A host application calls [`register_core`] once (or many times; it is
//! idempotent) before opening any database. The first call loads the
//! encryption extension, then the PowerSync engine extension, and records the
//! outcome for the rest of the process lifetime.
//!
//! # Example
//!
//! ```rust,ignore
//! use powersync_native::{register_core, ConnectionRegistry, DatabaseOptions};
//!
//! fn main() -> powersync_native::Result<()> {
//!     let code = register_core();
//!     if code != 0 {
//!         eprintln!("native registration failed: {}", code);
//!     }
//!
//!     let registry = ConnectionRegistry::for_process();
//!     let _conn = registry.open(&DatabaseOptions::new("app.db"))?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dependency;
pub mod error;
pub mod loader;
pub mod platform;
pub mod registrar;

mod global;

// Re-export commonly used types
pub use config::{ConnectionConfig, LinkMode, RegistrarConfig};
pub use connection::{ConnectionRegistry, DatabaseOptions, SharedConnection};
pub use dependency::{DependencyPlan, LibraryDependency};
pub use error::{RegistrarError, ResponseCode, Result};
pub use global::{configure_core, core_report, core_state, register_core, ProcessCore};
pub use loader::{DynamicLoader, ExtensionLoader};
pub use registrar::{
    Registrar, RegistrarBuilder, RegistrationGate, RegistrationReport, RegistrationState,
};

/// Version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
