//! Database connections that open only after native registration succeeded.
//!
//! The registry keeps at most one connection per database file name. Opening
//! a name that is already registered closes the previous connection first.

use crate::config::ConnectionConfig;
use crate::error::{RegistrarError, ResponseCode, Result};
use crate::global::ProcessCore;
use crate::registrar::RegistrationGate;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// A connection shared between callers.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// How to open a database.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    pub db_filename: String,
    /// Directory holding the database; the current directory when `None`.
    pub db_location: Option<PathBuf>,
    #[serde(skip_serializing, default)]
    pub encryption_key: Option<String>,
    pub busy_timeout_ms: u32,
    /// Open with `query_only` set.
    pub read_only: bool,
}

impl DatabaseOptions {
    pub fn new(db_filename: impl Into<String>) -> Self {
        Self {
            db_filename: db_filename.into(),
            db_location: None,
            encryption_key: None,
            busy_timeout_ms: ConnectionConfig::BUSY_TIMEOUT_MS,
            read_only: false,
        }
    }

    pub fn with_location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.db_location = Some(dir.into());
        self
    }

    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn with_busy_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Full path of the database file.
    pub fn path(&self) -> PathBuf {
        match self.db_location {
            Some(ref dir) => dir.join(&self.db_filename),
            None => PathBuf::from(&self.db_filename),
        }
    }
}

impl std::fmt::Debug for DatabaseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseOptions")
            .field("db_filename", &self.db_filename)
            .field("db_location", &self.db_location)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Named connections guarded by a [`RegistrationGate`].
pub struct ConnectionRegistry {
    gate: Arc<dyn RegistrationGate>,
    connections: Mutex<HashMap<String, SharedConnection>>,
}

impl ConnectionRegistry {
    pub fn new(gate: Arc<dyn RegistrationGate>) -> Self {
        Self {
            gate,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Registry gated on the process-wide registrar.
    pub fn for_process() -> Self {
        Self::new(Arc::new(ProcessCore))
    }

    fn lock_connections(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SharedConnection>>> {
        self.connections.lock().map_err(|_| RegistrarError::Database {
            message: "Failed to acquire connection registry lock".to_string(),
            source: None,
        })
    }

    /// Register native extensions if needed, then open `options.db_filename`.
    ///
    /// Fails with [`RegistrarError::RegistrationFailed`] carrying the
    /// registration code when the extensions are not available.
    pub fn open(&self, options: &DatabaseOptions) -> Result<SharedConnection> {
        if options.db_filename.trim().is_empty() {
            return Err(RegistrarError::Config {
                message: "Database filename must not be empty".to_string(),
            });
        }

        let code = self.gate.ensure_registered();
        if code != ResponseCode::SUCCESS {
            return Err(RegistrarError::RegistrationFailed { code });
        }

        let mut connections = self.lock_connections()?;
        if let Some(existing) = connections.remove(&options.db_filename) {
            debug!("Closing existing connection to {}", options.db_filename);
            close_shared(&options.db_filename, existing);
        }

        let conn = open_connection(options)?;
        let shared = Arc::new(Mutex::new(conn));
        connections.insert(options.db_filename.clone(), shared.clone());
        debug!("Opened connection to {}", options.path().display());

        Ok(shared)
    }

    pub fn get(&self, db_filename: &str) -> Result<Option<SharedConnection>> {
        Ok(self.lock_connections()?.get(db_filename).cloned())
    }

    /// Close and forget a connection. Returns false if none was registered.
    pub fn close(&self, db_filename: &str) -> Result<bool> {
        let removed = self.lock_connections()?.remove(db_filename);
        match removed {
            Some(shared) => {
                close_shared(db_filename, shared);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registered database names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock_connections()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Close every connection. Returns how many were registered.
    pub fn close_all(&self) -> Result<usize> {
        let drained: Vec<(String, SharedConnection)> = self.lock_connections()?.drain().collect();
        let count = drained.len();
        for (name, shared) in drained {
            close_shared(&name, shared);
        }
        Ok(count)
    }
}

fn open_connection(options: &DatabaseOptions) -> Result<Connection> {
    if let Some(ref dir) = options.db_location {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| RegistrarError::io_with_path(e, dir))?;
        }
    }

    let conn = Connection::open(options.path())?;

    if let Some(ref key) = options.encryption_key {
        // Plain SQLite accepts `PRAGMA key` silently and writes plaintext.
        if cipher_version(&conn)?.is_none() {
            return Err(RegistrarError::Config {
                message: format!(
                    "Encryption key given for {} but the linked SQLite has no cipher support",
                    options.db_filename
                ),
            });
        }
        // The key must be the first statement on an encrypted database.
        conn.pragma_update(None, "key", key)?;
    }
    configure_connection(&conn, options)?;
    Ok(conn)
}

/// SQLCipher version of the linked SQLite, `None` without cipher support.
pub fn cipher_version(conn: &Connection) -> Result<Option<String>> {
    let version = conn
        .query_row("PRAGMA cipher_version", [], |row| row.get::<_, String>(0))
        .optional()?;
    Ok(version.filter(|v| !v.is_empty()))
}

fn configure_connection(conn: &Connection, options: &DatabaseOptions) -> Result<()> {
    conn.busy_timeout(Duration::from_millis(u64::from(options.busy_timeout_ms)))?;
    if options.read_only {
        conn.pragma_update(None, "query_only", true)?;
    } else {
        conn.pragma_update(None, "journal_mode", ConnectionConfig::JOURNAL_MODE)?;
        conn.pragma_update(None, "synchronous", ConnectionConfig::SYNCHRONOUS)?;
    }
    Ok(())
}

/// Close a connection if this was the last reference; otherwise it closes
/// when the remaining holders drop it.
fn close_shared(name: &str, shared: SharedConnection) {
    let Ok(mutex) = Arc::try_unwrap(shared) else {
        debug!("Connection {} still in use; it closes with its last holder", name);
        return;
    };
    let conn = mutex.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Err((_conn, e)) = conn.close() {
        warn!("Failed to close connection {}: {}", name, e);
    }
}
