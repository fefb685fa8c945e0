//! Connection pool and store lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

type SqlitePool = Pool<SqliteConnectionManager>;
pub(crate) type SqliteConnection = PooledConnection<SqliteConnectionManager>;

const MEMORY_PATH: &str = ":memory:";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A private in-memory database owned by the backend.
    Memory,
    /// A database file, created on first use.
    File(PathBuf),
}

impl StoreLocation {
    /// `:memory:` selects an in-memory store, anything else is a file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_PATH {
            StoreLocation::Memory
        } else {
            StoreLocation::File(path.to_path_buf())
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::Memory => f.write_str(MEMORY_PATH),
            StoreLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Pool and pragma settings. Missing fields take their defaults when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteBackendConfig {
    /// Pool size for file databases. In-memory stores always use one connection.
    pub max_connections: u32,

    /// Idle connections kept open for file databases.
    pub min_connections: u32,

    /// How long a caller waits for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,

    /// `PRAGMA busy_timeout`, in milliseconds.
    pub busy_timeout_ms: u32,

    /// Switch file databases to write-ahead logging.
    pub enable_wal: bool,

    /// `PRAGMA foreign_keys`. Join rows rely on it for `ON DELETE CASCADE`.
    pub enable_foreign_keys: bool,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// SQLite store for the storefront catalogue.
pub struct SqliteBackend {
    pool: SqlitePool,
    location: StoreLocation,
    config: SqliteBackendConfig,
    catalog: Catalog,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("location", &self.location)
            .field("pool_size", &self.pool.max_size())
            .field("tables", &self.catalog.tables().len())
            .finish_non_exhaustive()
    }
}

fn connection_failed(err: impl fmt::Display) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: "sqlite".to_string(),
        message: err.to_string(),
    })
}

fn build_pool(location: &StoreLocation, config: &SqliteBackendConfig) -> StorageResult<SqlitePool> {
    let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
    let foreign_keys = config.enable_foreign_keys;

    let manager = match location {
        StoreLocation::Memory => SqliteConnectionManager::memory(),
        StoreLocation::File(path) => SqliteConnectionManager::file(path),
    }
    .with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", foreign_keys)
    });

    let builder =
        Pool::builder().connection_timeout(Duration::from_millis(config.connection_timeout_ms));
    // Each in-memory connection would open its own empty database.
    let builder = match location {
        StoreLocation::Memory => builder
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None),
        StoreLocation::File(_) => builder
            .max_size(config.max_connections)
            .min_idle(Some(config.min_connections)),
    };

    builder.build(manager).map_err(connection_failed)
}

impl SqliteBackend {
    /// Opens a private in-memory store.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(MEMORY_PATH, SqliteBackendConfig::default())
    }

    /// Opens (or creates) a store at `path`. `:memory:` opens an in-memory store.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Opens a store with explicit pool and pragma settings.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> StorageResult<Self> {
        let location = StoreLocation::from_path(path);
        let pool = build_pool(&location, &config)?;

        if config.enable_wal && matches!(location, StoreLocation::File(_)) {
            let conn = pool.get().map_err(connection_failed)?;
            // journal_mode answers with the resulting mode
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| {
                    StorageError::Backend(BackendError::Internal {
                        backend_name: "sqlite".to_string(),
                        message: format!("Failed to enable WAL mode: {}", e),
                        source: None,
                    })
                })?;
        }

        tracing::debug!(location = %location, "Opened SQLite store");
        Ok(Self {
            pool,
            location,
            config,
            catalog: Catalog::storefront(),
        })
    }

    /// Creates every catalogue table and join table that does not exist yet.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn, &self.catalog)?;
        tracing::info!(
            location = %self.location,
            tables = self.catalog.tables().len(),
            schema_version = schema::SCHEMA_VERSION,
            "SQLite schema initialized"
        );
        Ok(())
    }

    pub(crate) fn get_connection(&self) -> StorageResult<SqliteConnection> {
        self.pool.get().map_err(connection_failed)
    }

    /// Returns true for an in-memory store.
    pub fn is_memory(&self) -> bool {
        self.location == StoreLocation::Memory
    }

    /// Returns where the database lives.
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    /// Returns the table catalogue the store was opened with.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
