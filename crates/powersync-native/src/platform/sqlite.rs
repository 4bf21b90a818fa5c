//! Registration of extension entry points with the SQLite linked into this process.
#![allow(unsafe_code)]

use super::dylib::SymbolAddress;
use crate::error::{RegistrarError, Result};
use rusqlite::ffi;
use tracing::debug;

/// Register `entry_point` so SQLite runs it for every connection opened afterwards.
///
/// `entry_point` must be the address of a function with the SQLite extension
/// signature `int (*)(sqlite3*, char**, const sqlite3_api_routines*)`.
/// A nonzero SQLite result is returned verbatim in [`RegistrarError::ExtensionInit`].
pub fn register_auto_extension(library: &str, entry_point: SymbolAddress) -> Result<()> {
    // SAFETY: the caller resolved entry_point from a library that stays loaded for
    // the process lifetime, and it has the extension entry point signature.
    // sqlite3_auto_extension is thread-safe and ignores duplicate registrations.
    let rc = unsafe {
        ffi::sqlite3_auto_extension(Some(std::mem::transmute::<*mut std::ffi::c_void, _>(
            entry_point.as_ptr(),
        )))
    };

    if rc != ffi::SQLITE_OK {
        return Err(RegistrarError::ExtensionInit {
            library: library.to_string(),
            code: rc,
        });
    }

    debug!("Registered SQLite auto extension from {}", library);
    Ok(())
}
