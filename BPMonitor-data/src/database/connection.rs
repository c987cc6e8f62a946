//! Database connection module for the BP Monitor application
//!
//! The application keeps credentials and health data in two separate SQLite
//! files:
//! - the auth database (users, sessions, login attempts)
//! - the readings database (profiles, blood pressure readings)
//!
//! Each file gets its own r2d2 pool. Foreign keys are switched on for every
//! pooled connection so that cascading deletes behave.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;
use tracing::{debug, info};

use super::migrations::{run_auth_migrations, run_readings_migrations};

/// Pool type shared by every repository
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// Database error
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    SqlitePoolError(#[from] r2d2::Error),

    /// Connection error
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// Generic database error
    #[error("Database error: {0}")]
    GenericError(String),
}

impl From<String> for DatabaseError {
    fn from(error: String) -> Self {
        DatabaseError::GenericError(error)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the auth database file
    pub auth_path: String,
    /// Path to the readings database file
    pub readings_path: String,
    /// Connection pool size for file-backed databases
    pub pool_size: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            auth_path: "data/auth.db".to_string(),
            readings_path: "data/blood_pressure.db".to_string(),
            pool_size: 5,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Self {
        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

        let auth_path = env::var("AUTH_DB_PATH")
            .unwrap_or_else(|_| format!("{}/auth.db", data_dir.trim_end_matches('/')));
        let readings_path = env::var("READINGS_DB_PATH")
            .unwrap_or_else(|_| format!("{}/blood_pressure.db", data_dir.trim_end_matches('/')));

        let pool_size = env::var("DB_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(5);

        let timeout_seconds = env::var("DB_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        info!(
            "Database configuration: auth={}, readings={}, pool_size={}, timeout={}s",
            auth_path, readings_path, pool_size, timeout_seconds
        );

        Self {
            auth_path,
            readings_path,
            pool_size,
            timeout_seconds,
        }
    }

    /// Configuration with both databases held in memory
    pub fn in_memory() -> Self {
        Self {
            auth_path: ":memory:".to_string(),
            readings_path: ":memory:".to_string(),
            ..Self::default()
        }
    }
}

/// Handle to both database pools
#[derive(Clone)]
pub struct Database {
    auth: SqlitePool,
    readings: SqlitePool,
    auth_path: String,
    readings_path: String,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("auth_path", &self.auth_path)
            .field("readings_path", &self.readings_path)
            .finish()
    }
}

impl Database {
    /// Open both pools and bring their schemas up to date
    pub fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        info!("Initializing database pools");

        let auth = open_pool(&config.auth_path, config)?;
        run_auth_migrations(&*auth.get()?).map_err(DatabaseError::MigrationError)?;

        let readings = open_pool(&config.readings_path, config)?;
        run_readings_migrations(&*readings.get()?).map_err(DatabaseError::MigrationError)?;

        info!("Database pools initialized successfully");

        Ok(Self {
            auth,
            readings,
            auth_path: config.auth_path.clone(),
            readings_path: config.readings_path.clone(),
        })
    }

    /// Both databases in memory, used by tests
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::connect(&DatabaseConfig::in_memory())
    }

    /// Pool for users, sessions and login attempts
    pub fn auth_pool(&self) -> &SqlitePool {
        &self.auth
    }

    /// Pool for profiles and readings
    pub fn readings_pool(&self) -> &SqlitePool {
        &self.readings
    }

    /// Run a trivial query against both databases
    pub fn check_health(&self) -> Result<(), DatabaseError> {
        for pool in [&self.auth, &self.readings] {
            let conn = pool.get()?;
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            if one != 1 {
                return Err(DatabaseError::ConnectionError("unexpected health query result".to_string()));
            }
        }
        Ok(())
    }

    /// Human readable summary of the configured pools
    pub fn get_connection_info(&self) -> String {
        let auth_state = self.auth.state();
        let readings_state = self.readings.state();
        format!(
            "SQLite auth={} ({} connections, {} idle); readings={} ({} connections, {} idle)",
            describe_path(&self.auth_path),
            auth_state.connections,
            auth_state.idle_connections,
            describe_path(&self.readings_path),
            readings_state.connections,
            readings_state.idle_connections,
        )
    }
}

fn is_memory_path(path: &str) -> bool {
    path.is_empty() || path == ":memory:"
}

fn describe_path(path: &str) -> &str {
    if is_memory_path(path) {
        "in-memory"
    } else {
        path
    }
}

/// Open a pool for one database file
fn open_pool(path: &str, config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let timeout = Duration::from_secs(config.timeout_seconds);

    if is_memory_path(path) {
        debug!("Initializing in-memory SQLite database");

        // Every in-memory connection is its own database, so the pool keeps exactly one alive.
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(timeout)
            .build(manager)?;
        return Ok(pool);
    }

    info!("Initializing SQLite database at: {}", path);

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating parent directory: {:?}", parent);
            fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(format!("failed to create {:?}: {}", parent, e))
            })?;
        }
    }

    let manager = SqliteConnectionManager::file(path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(init_connection);

    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(timeout)
        .build(manager)?;

    info!("SQLite connection pool created successfully for {}", path);
    Ok(pool)
}

fn init_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}
