//! Platform abstraction layer for native library loading.
//!
//! All OS-specific code lives here so the rest of the crate stays free of
//! `#[cfg]` blocks and `unsafe`.
//!
//! # Architecture
//!
//! - `dylib` - Opening shared libraries and resolving symbols
//! - `sqlite` - Handing extension entry points to the linked SQLite
//!
//! # Supported Platforms
//!
//! - **Linux/Android**: `dlopen` with `RTLD_NOW | RTLD_GLOBAL`
//! - **macOS/iOS**: `dlopen` with `RTLD_NOW | RTLD_GLOBAL`
//! - **Windows**: `LoadLibraryW`

pub mod dylib;
pub mod sqlite;

pub use dylib::{library_filename, NativeLibrary, SymbolAddress};
pub use sqlite::register_auto_extension;

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    std::env::consts::OS
}

/// Returns true if shared libraries can be loaded on this platform.
pub fn supports_dynamic_loading() -> bool {
    cfg!(any(unix, windows))
}
