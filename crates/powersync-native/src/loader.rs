//! Loading a single dependency into the process.
//!
//! [`ExtensionLoader`] is the seam between the registration state machine and
//! the OS loader. [`DynamicLoader`] is the production implementation.

use crate::dependency::LibraryDependency;
use crate::error::{RegistrarError, Result};
use crate::platform::{self, NativeLibrary};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Loads one native dependency.
///
/// Implementations must be safe to call from any thread. The registrar calls
/// `load` at most once per dependency and never for a dependency whose
/// prerequisite failed.
pub trait ExtensionLoader: Send + Sync {
    fn load(&self, dependency: &LibraryDependency) -> Result<()>;
}

impl<L: ExtensionLoader + ?Sized> ExtensionLoader for Arc<L> {
    fn load(&self, dependency: &LibraryDependency) -> Result<()> {
        (**self).load(dependency)
    }
}

impl<L: ExtensionLoader + ?Sized> ExtensionLoader for Box<L> {
    fn load(&self, dependency: &LibraryDependency) -> Result<()> {
        (**self).load(dependency)
    }
}

/// Loads dependencies as shared libraries.
///
/// Each configured search directory is tried in order where it contains the
/// platform file name; the bare file name (resolved by the system loader) is
/// tried last unless the system fallback is disabled. Opened libraries are
/// retained for the lifetime of the loader.
#[derive(Debug)]
pub struct DynamicLoader {
    search_dirs: Vec<PathBuf>,
    system_fallback: bool,
    libraries: Mutex<Vec<NativeLibrary>>,
}

impl DynamicLoader {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            system_fallback: true,
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Enable or disable falling back to the system library search path.
    pub fn with_system_fallback(mut self, enabled: bool) -> Self {
        self.system_fallback = enabled;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Paths that will be tried for `name`, in order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let filename = platform::library_filename(name);
        let mut candidates: Vec<PathBuf> = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(&filename))
            .filter(|path| path.is_file())
            .collect();

        if self.system_fallback {
            candidates.push(PathBuf::from(filename));
        }
        candidates
    }

    /// Names and paths of the libraries opened so far.
    pub fn loaded_libraries(&self) -> Vec<(String, PathBuf)> {
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|lib| (lib.name().to_string(), lib.path().to_path_buf()))
            .collect()
    }

    fn open_first(&self, name: &str, candidates: &[PathBuf]) -> Result<NativeLibrary> {
        let mut first_error = None;
        for path in candidates {
            match NativeLibrary::open(name, path) {
                Ok(library) => return Ok(library),
                Err(e) => {
                    warn!("Could not load {} from {}: {}", name, path.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| self.not_found(name)))
    }

    fn not_found(&self, name: &str) -> RegistrarError {
        let filename = platform::library_filename(name);
        RegistrarError::LibraryNotFound {
            name: name.to_string(),
            searched: self.search_dirs.iter().map(|d| d.join(&filename)).collect(),
        }
    }

    fn register_entry_point(library: &NativeLibrary, symbol: &str) -> Result<()> {
        let address = library.symbol(symbol)?;
        debug!("Resolved {} in {}", symbol, library.name());
        platform::register_auto_extension(library.name(), address)
    }
}

impl Default for DynamicLoader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ExtensionLoader for DynamicLoader {
    fn load(&self, dependency: &LibraryDependency) -> Result<()> {
        let candidates = self.candidates(&dependency.name);
        if candidates.is_empty() {
            return Err(self.not_found(&dependency.name));
        }

        let library = self.open_first(&dependency.name, &candidates)?;
        info!(
            "Loaded native library {} from {}",
            dependency.name,
            library.path().display()
        );

        let result = match dependency.entry_point {
            Some(ref symbol) => Self::register_entry_point(&library, symbol),
            None => Ok(()),
        };

        // Retained even when the entry point fails: the library cannot be unloaded safely.
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(library);

        result
    }
}

/// Returns true if `dir` holds the platform file for `name`.
pub fn library_present(dir: &Path, name: &str) -> bool {
    dir.join(platform::library_filename(name)).is_file()
}
