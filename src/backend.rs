//! The uniform database interface.
//!
//! [`Database`] is implemented by [`Connection`](crate::connection::Connection),
//! which compiles queries and talks to a driver, and by
//! [`Resilient`](crate::retry::Resilient), which wraps any other `Database`
//! and adds retry and error classification. Callers program against the trait
//! and pick the stack they need.

use crate::cursor::SelectCursor;
use crate::dialect::{Dialect, SqlDialect};
use crate::error::QueryError;
use crate::query::{Assignment, Condition, Query};
use crate::transaction::{self, TransactionState};
use crate::value::{Row, Value};

/// Operations shared by connections and the wrappers around them.
pub trait Database {
    /// Dialect used to compile structured queries.
    fn dialect(&self) -> Dialect;

    /// Transaction flag of the underlying physical connection.
    fn transaction_state(&self) -> TransactionState;

    fn quote_identifier(&self, name: &str) -> String {
        self.dialect().quote_identifier(name)
    }

    /// Quote every `:name:` span in `expr`.
    fn quote_expression(&self, expr: &str) -> String {
        self.dialect().quote_expression(expr)
    }

    /// Execute a query and return a cursor over its rows.
    fn select(&mut self, query: &Query) -> Result<SelectCursor, QueryError>;

    /// First row of the result, if any. The cursor is released afterwards.
    fn fetch_one(&mut self, query: &Query) -> Result<Option<Row>, QueryError> {
        let mut cursor = self.select(query)?;
        let row = cursor.fetch()?;
        cursor.clear();
        Ok(row)
    }

    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, QueryError> {
        let mut cursor = self.select(query)?;
        let rows = cursor.fetch_all()?;
        cursor.clear();
        Ok(rows)
    }

    /// Every value of every row, in field order, rows concatenated.
    fn fetch_all_and_flatten(&mut self, query: &Query) -> Result<Vec<Value>, QueryError> {
        Ok(self
            .fetch_all(query)?
            .into_iter()
            .flat_map(Row::into_values)
            .collect())
    }

    /// Insert one row.
    ///
    /// # Arguments
    /// * `table` - Target table, may be schema-qualified
    /// * `row` - Column values in insertion order
    /// * `autoincrement` - Generated column whose new value should be returned
    ///
    /// # Returns
    /// The generated value as text when `autoincrement` is given, else `None`.
    fn insert(&mut self, table: &str, row: &Row, autoincrement: Option<&str>) -> Result<Option<String>, QueryError>;

    /// Apply `changes` to the rows matching `conditions`; returns the affected-row count.
    fn update(&mut self, table: &str, changes: &[Assignment], conditions: &[Condition]) -> Result<u64, QueryError>;

    /// Delete the rows matching `conditions` (all rows when empty).
    fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<u64, QueryError>;

    /// Insert `row`, or update the existing row with the same `index` values.
    ///
    /// `updates` of `None` updates every non-index column of `row`. An empty
    /// list leaves an existing row untouched.
    fn insert_or_update(
        &mut self,
        table: &str,
        row: &Row,
        index: &[&str],
        updates: Option<&[Assignment]>,
    ) -> Result<u64, QueryError>;

    /// Run a data-changing SQL statement and return the affected-row count.
    fn change(&mut self, sql: &str, params: &[Value]) -> Result<u64, QueryError>;

    fn begin_transaction(&mut self) -> Result<(), QueryError>;

    fn commit(&mut self) -> Result<(), QueryError>;

    fn rollback(&mut self) -> Result<(), QueryError>;

    /// Replace the session with a fresh one.
    fn reconnect(&mut self) -> Result<(), QueryError>;

    /// Run `body` in a transaction, or inline if one is already open.
    fn transaction<T, F>(&mut self, mut body: F) -> Result<T, QueryError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, QueryError>,
    {
        transaction::run(self, &mut body)
    }
}
