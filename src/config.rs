//! Connection configuration.
//!
//! A `.dbal.json` file in the current directory selects the database and,
//! optionally, the retry schedules (in microseconds):
//!
//! ```json
//! {
//!   "database": { "type": "sqlite", "path": "./app.sqlite" },
//!   "retries": { "connection": [1000, 100000], "lock": [1000, 10000, 100000] }
//! }
//! ```
//!
//! Without a file, `DATABASE_URL` is consulted, and without that an
//! in-memory SQLite database is used.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::driver::{Driver, DriverFailure};
use crate::retry::{Resilient, RetrySchedule};

pub const CONFIG_FILE: &str = ".dbal.json";

/// A connected, retrying database handle over whichever driver the
/// configuration selected.
pub type Db = Resilient<Connection<Box<dyn Driver>>>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported database URL '{0}'")]
    UnsupportedUrl(String),

    #[error("the {0} backend is not compiled into this build")]
    BackendDisabled(&'static str),

    #[error("failed to open database: {0}")]
    Open(#[from] DriverFailure),
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retries: RetryConfig,
}

/// Database selection. JSON uses a `type` tag with lowercase variant names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: PathBuf },
    Memory,
    Postgres { connection_string: String },
}

/// Retry schedules in microseconds. Missing lists keep the defaults; an
/// empty list disables that kind of retry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<Vec<u64>>,
}

impl RetryConfig {
    pub fn apply<DB: crate::backend::Database>(&self, db: &mut Resilient<DB>) {
        if let Some(waits) = &self.connection {
            db.set_connection_retries(RetrySchedule::from_micros(waits));
        }
        if let Some(waits) = &self.lock {
            db.set_lock_retries(RetrySchedule::from_micros(waits));
        }
    }
}

impl ConfigFile {
    /// Load `.dbal.json` from the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve configuration. Priority: config file > `DATABASE_URL` > in-memory.
    ///
    /// A config file that exists but fails to parse is an error rather than
    /// a silent fallback.
    pub fn resolve() -> Result<Self, ConfigError> {
        match Self::load() {
            Ok(config) => {
                debug!(file = CONFIG_FILE, "using configuration file");
                return Ok(config);
            }
            Err(ConfigError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let database = match DatabaseConfig::from_env()? {
            Some(database) => database,
            None => DatabaseConfig::Memory,
        };
        Ok(Self {
            database,
            retries: RetryConfig::default(),
        })
    }

    /// Open the configured database behind the retry decorator.
    pub fn connect(&self) -> Result<Db, ConfigError> {
        let mut db = Resilient::new(Connection::new(self.database.open_driver()?));
        self.retries.apply(&mut db);
        Ok(db)
    }
}

impl DatabaseConfig {
    /// Parse from a connection URL or file path.
    ///
    /// - `:memory:` → Memory
    /// - `sqlite:///path/to/db` → Sqlite
    /// - `postgres://…` or `postgresql://…` → Postgres
    /// - anything else without a scheme → Sqlite file path
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url == ":memory:" || url == "sqlite::memory:" {
            return Ok(Self::Memory);
        }

        if let Some(path) = url.strip_prefix("sqlite://") {
            return Ok(Self::Sqlite {
                path: PathBuf::from(path),
            });
        }

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres {
                connection_string: url.to_string(),
            });
        }

        if url.contains("://") {
            return Err(ConfigError::UnsupportedUrl(url.to_string()));
        }

        Ok(Self::Sqlite {
            path: PathBuf::from(url),
        })
    }

    /// Read `DATABASE_URL`, if set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Ok(Some(Self::from_url(&url)?)),
            _ => Ok(None),
        }
    }

    /// Open a bare driver for this configuration.
    pub fn open_driver(&self) -> Result<Box<dyn Driver>, ConfigError> {
        match self {
            #[cfg(feature = "backend-sqlite")]
            Self::Sqlite { path } => {
                info!(path = %path.display(), "opening SQLite database");
                Ok(Box::new(crate::driver::sqlite::SqliteDriver::open(path)?))
            }
            #[cfg(feature = "backend-sqlite")]
            Self::Memory => {
                info!("opening in-memory SQLite database");
                Ok(Box::new(crate::driver::sqlite::SqliteDriver::open_in_memory()?))
            }
            #[cfg(not(feature = "backend-sqlite"))]
            Self::Sqlite { .. } | Self::Memory => Err(ConfigError::BackendDisabled("sqlite")),

            #[cfg(feature = "backend-postgres")]
            Self::Postgres { connection_string } => {
                info!("connecting to PostgreSQL");
                Ok(Box::new(crate::driver::postgres::PostgresDriver::connect(
                    connection_string,
                )?))
            }
            #[cfg(not(feature = "backend-postgres"))]
            Self::Postgres { .. } => Err(ConfigError::BackendDisabled("postgres")),
        }
    }

    pub fn connect(&self) -> Result<Db, ConfigError> {
        Ok(Resilient::new(Connection::new(self.open_driver()?)))
    }
}
