//! dbal - a database access layer over MySQL, PostgreSQL and SQLite
//!
//! Structured, injection-safe queries compile to parameterized SQL for each
//! dialect; a retrying wrapper classifies driver failures and transparently
//! re-runs work after deadlocks and lost connections.

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod output;
pub mod query;
pub mod retry;
pub mod transaction;
pub mod value;

#[macro_use]
pub mod test_macros;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backend::Database;
pub use config::{ConfigError, ConfigFile, DatabaseConfig, Db};
pub use connection::Connection;
pub use cursor::{CursorState, SelectCursor};
pub use dialect::{Dialect, SqlDialect, UpsertStrategy};
pub use driver::{Driver, DriverFailure, FailureKind, ResultSet};
pub use error::{InvalidOption, Origin, QueryError};
pub use query::{
    Assignment, CompiledQuery, Condition, Direction, Field, OrderBy, Query, Statement, StructuredQuery, TableRef,
};
pub use retry::{Resilient, RetrySchedule, Sleeper, ThreadSleeper};
pub use transaction::TransactionState;
pub use value::{Row, Value};
