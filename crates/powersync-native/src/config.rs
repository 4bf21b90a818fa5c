//! Centralized configuration for the native registrar.
//!
//! This module provides the library names, entry points and connection
//! defaults used when no explicit configuration is supplied.

use std::path::PathBuf;

/// Native library configuration.
pub struct RegistrarConfig;

impl RegistrarConfig {
    /// Encryption extension; must be loaded first.
    pub const ENCRYPTION_LIBRARY: &'static str = "sqlcipher";
    /// Database engine extension; links against the encryption extension.
    pub const ENGINE_LIBRARY: &'static str = "powersync";
    pub const ENGINE_ENTRY_POINT: &'static str = "sqlite3_powersync_init";

    /// Environment variable holding extra library search directories.
    pub const SEARCH_DIR_ENV: &'static str = "POWERSYNC_NATIVE_LIB_DIR";

    /// Read search directories from [`Self::SEARCH_DIR_ENV`].
    ///
    /// Uses the platform path-list separator (`:` on Unix, `;` on Windows).
    /// Empty entries are skipped.
    pub fn search_dirs_from_env() -> Vec<PathBuf> {
        match std::env::var_os(Self::SEARCH_DIR_ENV) {
            Some(value) => std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Connection defaults applied by the connection gate.
pub struct ConnectionConfig;

impl ConnectionConfig {
    pub const BUSY_TIMEOUT_MS: u32 = 30_000;
    pub const JOURNAL_MODE: &'static str = "WAL";
    pub const SYNCHRONOUS: &'static str = "NORMAL";
}

/// How the native extensions reach the process.
///
/// Selected at build time through the `static-link` cargo feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Extensions are linked into the host binary; nothing is loaded.
    Static,
    /// Extensions are shared libraries loaded on first registration.
    Dynamic,
}

impl LinkMode {
    #[cfg(feature = "static-link")]
    pub const BUILD: LinkMode = LinkMode::Static;
    #[cfg(not(feature = "static-link"))]
    pub const BUILD: LinkMode = LinkMode::Dynamic;

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkMode::Static => "static",
            LinkMode::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
