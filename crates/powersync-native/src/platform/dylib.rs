//! Shared library handles.
//!
//! A [`NativeLibrary`] is never closed: once a library joined the process it
//! stays for the process lifetime, since extensions may have registered
//! global state that outlives any handle.
#![allow(unsafe_code)]

use crate::error::{RegistrarError, Result};
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use tracing::debug;

/// Platform file name for a library base name.
///
/// # Platform Behavior
/// - **Linux/Android**: `lib{name}.so`
/// - **macOS/iOS**: `lib{name}.dylib`
/// - **Windows**: `{name}.dll`
pub fn library_filename(name: &str) -> String {
    format!(
        "{}{}{}",
        std::env::consts::DLL_PREFIX,
        name,
        std::env::consts::DLL_SUFFIX
    )
}

/// Address of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAddress(NonNull<c_void>);

impl SymbolAddress {
    /// Wrap a raw address. Returns `None` for null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// An open shared library.
#[derive(Debug)]
pub struct NativeLibrary {
    name: String,
    path: PathBuf,
    handle: NonNull<c_void>,
}

// SAFETY: the handle is an opaque token owned by the OS loader. dlsym/GetProcAddress
// are thread-safe, and the handle is never closed, so it cannot dangle.
unsafe impl Send for NativeLibrary {}
// SAFETY: see above; no method mutates the handle.
unsafe impl Sync for NativeLibrary {}

impl NativeLibrary {
    /// Open `path` and make its symbols visible to libraries loaded later.
    ///
    /// `name` is the dependency name used in errors and logs.
    pub fn open(name: &str, path: &Path) -> Result<Self> {
        debug!("Opening native library {} from {}", name, path.display());
        let handle = sys::open(name, path)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            handle,
        })
    }

    /// Resolve an exported symbol.
    pub fn symbol(&self, symbol: &str) -> Result<SymbolAddress> {
        sys::symbol(self.handle, symbol)
            .map(SymbolAddress)
            .ok_or_else(|| RegistrarError::SymbolNotFound {
                library: self.name.clone(),
                symbol: symbol.to_string(),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
mod sys {
    use super::*;
    use std::ffi::{CStr, CString};
    use std::os::unix::ffi::OsStrExt;

    pub(super) fn open(name: &str, path: &Path) -> Result<NonNull<c_void>> {
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            RegistrarError::LoadFailed {
                name: name.to_string(),
                message: format!("path contains a NUL byte: {}", path.display()),
                os_code: None,
            }
        })?;

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        // RTLD_GLOBAL lets libraries opened later resolve symbols exported by this one.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };

        NonNull::new(handle).ok_or_else(|| RegistrarError::LoadFailed {
            name: name.to_string(),
            message: last_error(),
            os_code: None,
        })
    }

    pub(super) fn symbol(handle: NonNull<c_void>, symbol: &str) -> Option<NonNull<c_void>> {
        let c_symbol = CString::new(symbol).ok()?;
        // SAFETY: handle came from a successful dlopen and is never closed;
        // c_symbol is NUL-terminated.
        let address = unsafe { libc::dlsym(handle.as_ptr(), c_symbol.as_ptr()) };
        NonNull::new(address)
    }

    fn last_error() -> String {
        // SAFETY: dlerror returns null or a NUL-terminated string that stays valid
        // until the next dl* call on this thread; it is copied immediately.
        unsafe {
            let message = libc::dlerror();
            if message.is_null() {
                "unknown dynamic loader error".to_string()
            } else {
                CStr::from_ptr(message).to_string_lossy().into_owned()
            }
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use std::ffi::CString;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

    pub(super) fn open(name: &str, path: &Path) -> Result<NonNull<c_void>> {
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide is a NUL-terminated UTF-16 string that outlives the call.
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        NonNull::new(handle).ok_or_else(|| {
            // SAFETY: GetLastError only reads thread-local state.
            let code = unsafe { GetLastError() } as i32;
            RegistrarError::LoadFailed {
                name: name.to_string(),
                message: std::io::Error::from_raw_os_error(code).to_string(),
                os_code: Some(code),
            }
        })
    }

    pub(super) fn symbol(handle: NonNull<c_void>, symbol: &str) -> Option<NonNull<c_void>> {
        let c_symbol = CString::new(symbol).ok()?;
        // SAFETY: handle came from a successful LoadLibraryW and is never freed;
        // c_symbol is NUL-terminated.
        let address = unsafe { GetProcAddress(handle.as_ptr(), c_symbol.as_ptr() as *const u8) };
        address.and_then(|f| NonNull::new(f as *mut c_void))
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use super::*;

    pub(super) fn open(name: &str, _path: &Path) -> Result<NonNull<c_void>> {
        Err(RegistrarError::LoadFailed {
            name: name.to_string(),
            message: "dynamic loading is not supported on this platform".to_string(),
            os_code: None,
        })
    }

    pub(super) fn symbol(_handle: NonNull<c_void>, _symbol: &str) -> Option<NonNull<c_void>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_library_filename() {
        let filename = library_filename("sqlcipher");

        #[cfg(target_os = "linux")]
        assert_eq!(filename, "libsqlcipher.so");
        #[cfg(target_os = "macos")]
        assert_eq!(filename, "libsqlcipher.dylib");
        #[cfg(target_os = "windows")]
        assert_eq!(filename, "sqlcipher.dll");

        assert!(filename.contains("sqlcipher"));
    }

    #[test]
    fn test_open_missing_library_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(library_filename("does-not-exist"));

        let err = NativeLibrary::open("does-not-exist", &path).unwrap_err();
        match err {
            RegistrarError::LoadFailed { name, message, .. } => {
                assert_eq!(name, "does-not-exist");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_open_garbage_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(library_filename("garbage"));
        std::fs::write(&path, b"definitely not an ELF, Mach-O or PE image").unwrap();

        let err = NativeLibrary::open("garbage", &path).unwrap_err();
        assert!(matches!(err, RegistrarError::LoadFailed { .. }));
        assert_ne!(err.response_code(), 0);
    }

    #[test]
    fn test_symbol_address_rejects_null() {
        assert!(SymbolAddress::new(std::ptr::null_mut()).is_none());
    }
}
