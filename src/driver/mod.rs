//! Contract with the low-level database driver.
//!
//! A [`Driver`] is the only component that talks to a database. It prepares and
//! executes SQL with positional `?` parameters, exposes transaction primitives
//! and a reconnect primitive, and reports failures as one of three
//! [`FailureKind`]s so the retry layer can decide what is transient.
//!
//! Bindings shipped with the crate:
//! - `sqlite` (feature `backend-sqlite`): rusqlite, bundled SQLite
//! - `postgres` (feature `backend-postgres`): the synchronous `postgres` client
//!
//! MySQL is supported at the dialect level; applications bring their own
//! `Driver` implementation for it.

use std::collections::VecDeque;

use thiserror::Error;

use crate::dialect::Dialect;
use crate::value::{Row, Value};

#[cfg(feature = "backend-postgres")]
pub mod postgres;
#[cfg(feature = "backend-sqlite")]
pub mod sqlite;

/// How the retry layer should treat a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection dropped; reconnecting may help.
    ConnectionLost,
    /// Deadlock or lock-wait timeout; running again may help.
    Deadlock,
    /// Anything else the database rejected (bad SQL, constraint violation).
    Statement,
}

/// A failure reported by a driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Vendor error code (SQLSTATE, SQLite extended code), when known.
    pub code: Option<String>,
}

impl DriverFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConnectionLost, message)
    }

    pub fn deadlock(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Deadlock, message)
    }

    pub fn statement(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Statement, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Handle over the result of one executed statement.
///
/// Rows may be streamed: `fetch_one` is allowed to fail after `execute`
/// succeeded. Such failures are classified like statement failures when the
/// cursor came from `Resilient`, but they are not retried.
pub trait ResultSet {
    /// Next row, or `None` once the result is exhausted.
    fn fetch_one(&mut self) -> Result<Option<Row>, DriverFailure>;

    /// All remaining rows.
    fn fetch_all(&mut self) -> Result<Vec<Row>, DriverFailure> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_one()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Rows affected by a data-changing statement.
    fn row_count(&self) -> u64;

    /// Release driver resources. Called at most once per handle.
    fn free(&mut self);
}

/// Minimal surface the connection layer needs from a database client.
pub trait Driver {
    /// SQL dialect spoken by the server behind this driver.
    fn dialect(&self) -> Dialect;

    /// Prepare and execute `sql`, binding `params` to its `?` placeholders in order.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn ResultSet>, DriverFailure>;

    /// Key generated by the most recent insert, if the server reports one.
    fn last_insert_id(&mut self) -> Result<Option<String>, DriverFailure>;

    fn begin_transaction(&mut self) -> Result<(), DriverFailure>;

    fn commit(&mut self) -> Result<(), DriverFailure>;

    fn rollback(&mut self) -> Result<(), DriverFailure>;

    /// Drop the current session and open a fresh one with the same settings.
    fn reconnect(&mut self) -> Result<(), DriverFailure>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn ResultSet>, DriverFailure> {
        (**self).execute(sql, params)
    }

    fn last_insert_id(&mut self) -> Result<Option<String>, DriverFailure> {
        (**self).last_insert_id()
    }

    fn begin_transaction(&mut self) -> Result<(), DriverFailure> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        (**self).rollback()
    }

    fn reconnect(&mut self) -> Result<(), DriverFailure> {
        (**self).reconnect()
    }
}

/// Result set whose rows were fully read at execute time.
///
/// Both bundled drivers buffer: their native statement handles borrow the
/// client, which would otherwise pin the connection for the cursor's lifetime.
#[derive(Debug, Default)]
pub struct BufferedResult {
    rows: VecDeque<Row>,
    affected: u64,
}

impl BufferedResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        let affected = rows.len() as u64;
        Self {
            rows: rows.into(),
            affected,
        }
    }

    pub fn affected(affected: u64) -> Self {
        Self {
            rows: VecDeque::new(),
            affected,
        }
    }
}

impl ResultSet for BufferedResult {
    fn fetch_one(&mut self) -> Result<Option<Row>, DriverFailure> {
        Ok(self.rows.pop_front())
    }

    fn row_count(&self) -> u64 {
        self.affected
    }

    fn free(&mut self) {
        self.rows.clear();
    }
}
