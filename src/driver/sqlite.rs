//! SQLite driver backed by rusqlite (bundled SQLite).

use std::path::{Path, PathBuf};

use ::rusqlite::types::{Value as SqlValue, ValueRef};
use ::rusqlite::{params_from_iter, Connection as RawConnection, ErrorCode};

use super::{BufferedResult, Driver, DriverFailure, ResultSet};
use crate::dialect::Dialect;
use crate::value::{Row, Value};

/// Where the database lives; kept so `reconnect` can reopen it.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

pub struct SqliteDriver {
    conn: RawConnection,
    location: Location,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverFailure> {
        let path = path.as_ref().to_path_buf();
        let conn = RawConnection::open(&path).map_err(open_failure)?;
        Ok(Self {
            conn,
            location: Location::File(path),
        })
    }

    /// Private in-memory database. A reconnect starts from an empty database.
    pub fn open_in_memory() -> Result<Self, DriverFailure> {
        let conn = RawConnection::open_in_memory().map_err(open_failure)?;
        Ok(Self {
            conn,
            location: Location::Memory,
        })
    }

    pub fn raw(&self) -> &RawConnection {
        &self.conn
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Str(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Str(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Busy and locked databases are the SQLite flavour of a lock conflict.
fn failure(err: ::rusqlite::Error) -> DriverFailure {
    match &err {
        ::rusqlite::Error::SqliteFailure(inner, _) | ::rusqlite::Error::SqlInputError { error: inner, .. } => {
            let code = inner.extended_code.to_string();
            match inner.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    DriverFailure::deadlock(err.to_string()).with_code(code)
                }
                _ => DriverFailure::statement(err.to_string()).with_code(code),
            }
        }
        _ => DriverFailure::statement(err.to_string()),
    }
}

fn open_failure(err: ::rusqlite::Error) -> DriverFailure {
    DriverFailure::connection_lost(format!("cannot open database: {}", err))
}

impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::sqlite()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn ResultSet>, DriverFailure> {
        let mut stmt = self.conn.prepare(sql).map_err(failure)?;
        let bound = params_from_iter(params.iter().map(to_sql));

        if stmt.column_count() == 0 {
            let affected = stmt.execute(bound).map_err(failure)?;
            return Ok(Box::new(BufferedResult::affected(affected as u64)));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(bound).map_err(failure)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(failure)? {
            let values = (0..columns.len())
                .map(|idx| row.get_ref(idx).map(from_sql))
                .collect::<Result<Vec<_>, _>>()
                .map_err(failure)?;
            out.push(Row::from_parts(columns.clone(), values));
        }
        Ok(Box::new(BufferedResult::rows(out)))
    }

    fn last_insert_id(&mut self) -> Result<Option<String>, DriverFailure> {
        Ok(Some(self.conn.last_insert_rowid().to_string()))
    }

    fn begin_transaction(&mut self) -> Result<(), DriverFailure> {
        self.conn.execute_batch("BEGIN").map_err(failure)
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.conn.execute_batch("COMMIT").map_err(failure)
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.conn.execute_batch("ROLLBACK").map_err(failure)
    }

    fn reconnect(&mut self) -> Result<(), DriverFailure> {
        self.conn = match &self.location {
            Location::File(path) => RawConnection::open(path),
            Location::Memory => RawConnection::open_in_memory(),
        }
        .map_err(open_failure)?;
        Ok(())
    }
}
