//! PostgreSQL driver backed by the synchronous `postgres` client.
//!
//! Statements use `?` placeholders throughout the crate; they are rewritten
//! to `$1, $2, …` here. Parameters are encoded according to the types the
//! server inferred for the prepared statement, so an integer bound to an
//! `INT4` column is sent as four bytes and a string bound to `INT8` is parsed
//! first. Only the boolean, integer, float, text and bytea families are
//! encoded and decoded natively; for other types cast through text in the
//! SQL (`?::text::date`, `created_at::text`).

use std::error::Error;

use ::postgres::error::SqlState;
use ::postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use ::postgres::{Client, NoTls};
use bytes::BytesMut;

use super::{BufferedResult, Driver, DriverFailure, ResultSet};
use crate::dialect::Dialect;
use crate::value::{Row, Value};

pub struct PostgresDriver {
    client: Client,
    connection_string: String,
}

impl PostgresDriver {
    /// Connect with a libpq-style or URL connection string.
    pub fn connect(connection_string: &str) -> Result<Self, DriverFailure> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| DriverFailure::connection_lost(format!("failed to connect to PostgreSQL: {}", e)))?;
        Ok(Self {
            client,
            connection_string: connection_string.to_string(),
        })
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    fn failure(&self, err: ::postgres::Error) -> DriverFailure {
        classify(err, self.client.is_closed())
    }
}

/// Rewrite `?` placeholders to `$n`, leaving string literals and quoted
/// identifiers alone.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut n = 0;

    for ch in sql.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                continue;
            }
            (None, _) => {}
        }
        out.push(ch);
    }
    out
}

/// Lock conflicts: deadlock, serialization failure, lock not available.
const LOCK_STATES: &[SqlState] = &[
    SqlState::T_R_DEADLOCK_DETECTED,
    SqlState::T_R_SERIALIZATION_FAILURE,
    SqlState::LOCK_NOT_AVAILABLE,
];

fn classify(err: ::postgres::Error, client_closed: bool) -> DriverFailure {
    let message = err.to_string();
    match err.code() {
        Some(state) if LOCK_STATES.contains(state) => DriverFailure::deadlock(message).with_code(state.code()),
        // Class 08: connection exception; 57P01..57P03: server shutting down.
        Some(state) if state.code().starts_with("08") || state.code().starts_with("57P0") => {
            DriverFailure::connection_lost(message).with_code(state.code())
        }
        Some(state) => DriverFailure::statement(message).with_code(state.code()),
        None if client_closed || err.is_closed() || err.source().is_some_and(|s| s.is::<std::io::Error>()) => {
            DriverFailure::connection_lost(message)
        }
        None => DriverFailure::statement(message),
    }
}

#[derive(Debug)]
struct Param<'a>(&'a Value);

type BoxError = Box<dyn Error + Sync + Send>;

impl ToSql for Param<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ => int_to_sql(i64::from(*b), ty, out),
            },
            Value::Int(i) => int_to_sql(*i, ty, out),
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Str(s) => match *ty {
                Type::BOOL => s.parse::<bool>()?.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => int_to_sql(s.trim().parse()?, ty, out),
                Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Blob(bytes) => bytes.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn int_to_sql(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::OID => u32::try_from(value)?.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        Type::BOOL => (value != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            value.to_string().as_str().to_sql(ty, out)
        }
        _ => value.to_sql(ty, out),
    }
}

fn cell(row: &::postgres::Row, idx: usize, ty: &Type) -> Result<Value, ::postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Int(i64::from(v))),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(|v| Value::Int(i64::from(v))),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Blob),
        _ => row.try_get::<_, Option<String>>(idx)?.map(Value::Str),
    };
    Ok(value.unwrap_or(Value::Null))
}

impl Driver for PostgresDriver {
    fn dialect(&self) -> Dialect {
        Dialect::postgres()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Box<dyn ResultSet>, DriverFailure> {
        let sql = number_placeholders(sql);
        let statement = self.client.prepare(&sql).map_err(|e| self.failure(e))?;
        let wrapped: Vec<Param<'_>> = params.iter().map(Param).collect();
        let bound: Vec<&(dyn ToSql + Sync)> = wrapped.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if statement.columns().is_empty() {
            let affected = self
                .client
                .execute(&statement, &bound)
                .map_err(|e| self.failure(e))?;
            return Ok(Box::new(BufferedResult::affected(affected)));
        }

        let columns: Vec<String> = statement.columns().iter().map(|c| c.name().to_string()).collect();
        let types: Vec<Type> = statement.columns().iter().map(|c| c.type_().clone()).collect();
        let raw_rows = self
            .client
            .query(&statement, &bound)
            .map_err(|e| self.failure(e))?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in &raw_rows {
            let values = types
                .iter()
                .enumerate()
                .map(|(idx, ty)| cell(raw, idx, ty))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| self.failure(e))?;
            rows.push(Row::from_parts(columns.clone(), values));
        }
        Ok(Box::new(BufferedResult::rows(rows)))
    }

    fn last_insert_id(&mut self) -> Result<Option<String>, DriverFailure> {
        let row = self
            .client
            .query_one("SELECT lastval()", &[])
            .map_err(|e| self.failure(e))?;
        let id: i64 = row.try_get(0).map_err(|e| self.failure(e))?;
        Ok(Some(id.to_string()))
    }

    fn begin_transaction(&mut self) -> Result<(), DriverFailure> {
        self.client.batch_execute("BEGIN").map_err(|e| self.failure(e))
    }

    fn commit(&mut self) -> Result<(), DriverFailure> {
        self.client.batch_execute("COMMIT").map_err(|e| self.failure(e))
    }

    fn rollback(&mut self) -> Result<(), DriverFailure> {
        self.client.batch_execute("ROLLBACK").map_err(|e| self.failure(e))
    }

    fn reconnect(&mut self) -> Result<(), DriverFailure> {
        self.client = Client::connect(&self.connection_string, NoTls)
            .map_err(|e| DriverFailure::connection_lost(format!("failed to reconnect to PostgreSQL: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SELECT ?", "SELECT $1")]
    #[case("INSERT INTO t (a,b) VALUES (?,?)", "INSERT INTO t (a,b) VALUES ($1,$2)")]
    #[case("SELECT '?' || ? FROM \"wh?\"", "SELECT '?' || $1 FROM \"wh?\"")]
    #[case("SELECT 'it''s ?', ?", "SELECT 'it''s ?', $1")]
    #[case("SELECT 1", "SELECT 1")]
    fn test_number_placeholders(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(number_placeholders(input), expected);
    }

    #[rstest]
    fn test_int_param_encodes_by_type() {
        let mut out = BytesMut::new();
        Param(&Value::Int(7)).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(out.as_ref(), &7i32.to_be_bytes());

        let mut out = BytesMut::new();
        Param(&Value::Str("7".into())).to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(out.as_ref(), &7i64.to_be_bytes());
    }

    #[rstest]
    fn test_out_of_range_int_is_rejected() {
        let mut out = BytesMut::new();
        assert!(Param(&Value::Int(70_000)).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[rstest]
    fn test_null_param() {
        let mut out = BytesMut::new();
        assert!(matches!(
            Param(&Value::Null).to_sql(&Type::TEXT, &mut out).unwrap(),
            IsNull::Yes
        ));
    }
}
