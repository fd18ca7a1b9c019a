//! Dialect-aware [`Database`] implementation over a [`Driver`].

use std::cell::OnceCell;

use tracing::debug;

use crate::backend::Database;
use crate::cursor::SelectCursor;
use crate::dialect::{Dialect, SqlDialect, UpsertStrategy};
use crate::driver::{Driver, ResultSet};
use crate::error::{Origin, QueryError};
use crate::query::compile::{self, UpsertPlan};
use crate::query::{Assignment, CompiledQuery, Condition, Query};
use crate::transaction::TransactionState;
use crate::value::{Row, Value};

const fn origin(operation: &'static str) -> Origin {
    Origin::new("Connection", operation)
}

/// A driver session plus the state tied to it: the transaction flag and the
/// cached upsert strategy.
///
/// Raw driver failures are returned as [`QueryError::Raw`]; wrap the
/// connection in [`Resilient`](crate::retry::Resilient) to classify and
/// retry them.
pub struct Connection<D: Driver> {
    driver: D,
    dialect: Dialect,
    state: TransactionState,
    upsert: OnceCell<UpsertStrategy>,
}

impl<D: Driver> Connection<D> {
    pub fn new(driver: D) -> Self {
        Self::with_state(driver, TransactionState::new())
    }

    /// Use an existing transaction flag, shared with other holders.
    pub fn with_state(driver: D, state: TransactionState) -> Self {
        let dialect = driver.dialect();
        Self {
            driver,
            dialect,
            state,
            upsert: OnceCell::new(),
        }
    }

    /// Skip the lazy version probe by declaring the server version up front.
    pub fn with_server_version(self, version: &str) -> Self {
        let strategy = self.dialect.upsert_strategy(Some(version));
        let _ = self.upsert.set(strategy);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Upsert strategy for this server, probing its version on first use.
    pub fn upsert_strategy(&mut self) -> Result<UpsertStrategy, QueryError> {
        if let Some(strategy) = self.upsert.get() {
            return Ok(*strategy);
        }

        let version = match self.dialect.version_probe() {
            Some(probe) => {
                let mut cursor = SelectCursor::opened(self.driver.execute(probe, &[])?);
                let version = cursor
                    .fetch()?
                    .and_then(|row| row.get_index(0).and_then(|v| v.to_text()));
                cursor.clear();
                debug!(dialect = %self.dialect, version = ?version, "probed server version");
                version
            }
            None => None,
        };

        let strategy = self.dialect.upsert_strategy(version.as_deref());
        let _ = self.upsert.set(strategy);
        Ok(strategy)
    }

    fn execute(&mut self, compiled: &CompiledQuery) -> Result<Box<dyn ResultSet>, QueryError> {
        debug!(sql = %compiled.sql, params = compiled.params.len(), "executing");
        Ok(self.driver.execute(&compiled.sql, &compiled.params)?)
    }

    fn execute_affected(&mut self, compiled: &CompiledQuery) -> Result<u64, QueryError> {
        let mut handle = self.execute(compiled)?;
        let affected = handle.row_count();
        handle.free();
        Ok(affected)
    }
}

impl<D: Driver> Database for Connection<D> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn transaction_state(&self) -> TransactionState {
        self.state.clone()
    }

    fn select(&mut self, query: &Query) -> Result<SelectCursor, QueryError> {
        let compiled = query
            .compile(&self.dialect)
            .map_err(|e| e.at(origin("select")))?;
        Ok(SelectCursor::opened(self.execute(&compiled)?))
    }

    fn insert(&mut self, table: &str, row: &Row, autoincrement: Option<&str>) -> Result<Option<String>, QueryError> {
        let returning = autoincrement.filter(|col| self.dialect.returning_clause(col).is_some());
        let compiled = compile::compile_insert(&self.dialect, table, row, returning)
            .map_err(|e| e.at(origin("insert")))?;

        if returning.is_some() {
            let mut cursor = SelectCursor::opened(self.execute(&compiled)?);
            let id = cursor
                .fetch()?
                .and_then(|row| row.get_index(0).and_then(Value::to_text));
            cursor.clear();
            return Ok(id);
        }

        self.execute_affected(&compiled)?;
        match autoincrement {
            Some(_) => Ok(self.driver.last_insert_id()?),
            None => Ok(None),
        }
    }

    fn update(&mut self, table: &str, changes: &[Assignment], conditions: &[Condition]) -> Result<u64, QueryError> {
        let compiled = compile::compile_update(&self.dialect, table, changes, conditions)
            .map_err(|e| e.at(origin("update")))?;
        self.execute_affected(&compiled)
    }

    fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<u64, QueryError> {
        let compiled = compile::compile_delete(&self.dialect, table, conditions)
            .map_err(|e| e.at(origin("delete")))?;
        self.execute_affected(&compiled)
    }

    /// Native upsert where the server has one. Otherwise an `UPDATE` keyed on
    /// `index` runs in a transaction, followed by an `INSERT` when it matched
    /// no rows.
    ///
    /// The emulation is only as safe as the transaction's isolation level: two
    /// sessions can both see zero updated rows and both insert. Run it under
    /// SERIALIZABLE, or rely on a unique index to reject the loser.
    fn insert_or_update(
        &mut self,
        table: &str,
        row: &Row,
        index: &[&str],
        updates: Option<&[Assignment]>,
    ) -> Result<u64, QueryError> {
        let strategy = self.upsert_strategy()?;
        let plan = compile::plan_upsert(&self.dialect, strategy, table, row, index, updates)
            .map_err(|e| e.at(origin("insert_or_update")))?;

        match plan {
            UpsertPlan::Native(compiled) => self.execute_affected(&compiled),
            UpsertPlan::Emulated { update, insert } => self.transaction(|db| {
                let updated = db.execute_affected(&update)?;
                if updated > 0 {
                    return Ok(updated);
                }
                db.execute_affected(&insert)
            }),
        }
    }

    fn change(&mut self, sql: &str, params: &[Value]) -> Result<u64, QueryError> {
        let compiled = CompiledQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
        };
        self.execute_affected(&compiled)
    }

    fn begin_transaction(&mut self) -> Result<(), QueryError> {
        debug!("BEGIN");
        Ok(self.driver.begin_transaction()?)
    }

    fn commit(&mut self) -> Result<(), QueryError> {
        debug!("COMMIT");
        Ok(self.driver.commit()?)
    }

    fn rollback(&mut self) -> Result<(), QueryError> {
        debug!("ROLLBACK");
        Ok(self.driver.rollback()?)
    }

    fn reconnect(&mut self) -> Result<(), QueryError> {
        Ok(self.driver.reconnect()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::StructuredQuery;
    use crate::test_utils::{Call, MockDriver};
    use rstest::rstest;

    fn account_row(id: i64) -> Row {
        Row::new().with("id", id).with("name", "John")
    }

    #[rstest]
    fn test_emulated_upsert_existing_row_updates_only() {
        let driver = MockDriver::new(Dialect::sqlite()).with_version("3.20.0");
        driver.push_affected(1);
        let mut db = Connection::new(driver.clone());

        let affected = db.insert_or_update("account", &account_row(2), &["id"], None).unwrap();

        assert_eq!(affected, 1);
        let sql = driver.executed_sql();
        assert_eq!(sql.iter().filter(|s| s.starts_with("UPDATE")).count(), 1);
        assert_eq!(sql.iter().filter(|s| s.starts_with("INSERT")).count(), 0);
        assert_eq!(driver.count(&Call::Begin), 1);
        assert_eq!(driver.count(&Call::Commit), 1);
    }

    #[rstest]
    fn test_emulated_upsert_missing_row_inserts() {
        let driver = MockDriver::new(Dialect::sqlite()).with_version("3.20.0");
        driver.push_affected(0).push_affected(1);
        let mut db = Connection::new(driver.clone());

        let affected = db.insert_or_update("account", &account_row(9), &["id"], None).unwrap();

        assert_eq!(affected, 1);
        let sql: Vec<String> = driver
            .executed_sql()
            .into_iter()
            .filter(|s| !s.contains("sqlite_version"))
            .collect();
        assert_eq!(
            sql,
            vec![
                r#"UPDATE "account" SET "name"=? WHERE "id"=?"#.to_string(),
                r#"INSERT INTO "account" ("id","name") VALUES (?,?)"#.to_string(),
            ]
        );
    }

    #[rstest]
    fn test_version_probe_is_cached() {
        let driver = MockDriver::new(Dialect::sqlite()).with_version("3.45.0");
        let mut db = Connection::new(driver.clone());

        db.insert_or_update("account", &account_row(1), &["id"], None).unwrap();
        db.insert_or_update("account", &account_row(2), &["id"], None).unwrap();

        let sql = driver.executed_sql();
        assert_eq!(sql.iter().filter(|s| *s == "SELECT sqlite_version()").count(), 1);
        assert!(sql[1].ends_with(r#"ON CONFLICT ("id") DO UPDATE SET "name"=?"#));
        assert_eq!(driver.frees(), 3);
    }

    #[rstest]
    fn test_server_version_skips_probe() {
        let driver = MockDriver::new(Dialect::sqlite());
        let mut db = Connection::new(driver.clone()).with_server_version("3.31.1");

        assert_eq!(db.upsert_strategy().unwrap(), UpsertStrategy::OnConflict);
        assert!(driver.calls().is_empty());
    }

    #[rstest]
    fn test_postgres_insert_reads_returning() {
        let driver = MockDriver::new(Dialect::postgres());
        driver.push_rows(vec![Row::new().with("id", 17)]);
        let mut db = Connection::new(driver.clone());

        let id = db.insert("account", &Row::new().with("name", "x"), Some("id")).unwrap();

        assert_eq!(id.as_deref(), Some("17"));
        assert_eq!(
            driver.executed_sql(),
            vec![r#"INSERT INTO "account" ("name") VALUES (?) RETURNING "id""#.to_string()]
        );
        assert_eq!(driver.count(&Call::LastInsertId), 0);
    }

    #[rstest]
    fn test_mysql_insert_uses_last_insert_id() {
        let driver = MockDriver::new(Dialect::mysql());
        driver.set_last_insert_id("5");
        let mut db = Connection::new(driver.clone());

        let id = db.insert("account", &Row::new().with("name", "x"), Some("id")).unwrap();
        assert_eq!(id.as_deref(), Some("5"));

        let none = db.insert("account", &Row::new().with("name", "y"), None).unwrap();
        assert_eq!(none, None);
        assert_eq!(driver.count(&Call::LastInsertId), 1);
    }

    #[rstest]
    fn test_insert_rejects_empty_table() {
        let driver = MockDriver::new(Dialect::mysql());
        let mut db = Connection::new(driver.clone());
        let err = db.insert("", &account_row(1), None).unwrap_err();
        assert_eq!(err.origin(), Some(Origin::new("Connection", "insert")));
    }

    #[rstest]
    fn test_delete_without_conditions() {
        let driver = MockDriver::new(Dialect::mysql());
        driver.push_affected(4);
        let mut db = Connection::new(driver.clone());

        assert_eq!(db.delete("session", &[]).unwrap(), 4);
        assert_eq!(driver.executed_sql(), vec!["DELETE FROM `session` WHERE 1".to_string()]);
    }

    #[rstest]
    fn test_fetch_helpers_release_cursor() {
        let driver = MockDriver::new(Dialect::postgres());
        driver
            .push_rows(vec![Row::new().with("id", 1).with("name", "a"), Row::new().with("id", 2).with("name", "b")])
            .push_rows(vec![Row::new().with("id", 1)]);
        let mut db = Connection::new(driver.clone());
        let query: Query = StructuredQuery::builder().table("account").build().unwrap().into();

        let flat = db.fetch_all_and_flatten(&query).unwrap();
        assert_eq!(
            flat,
            vec![Value::Int(1), Value::Str("a".into()), Value::Int(2), Value::Str("b".into())]
        );
        let first = db.fetch_one(&query).unwrap();
        assert_eq!(first.and_then(|r| r.get("id").cloned()), Some(Value::Int(1)));
        assert_eq!(driver.frees(), 2);
    }

    #[rstest]
    fn test_select_invalid_query() {
        let driver = MockDriver::new(Dialect::postgres());
        let mut db = Connection::new(driver.clone());
        let query = Query::Structured(StructuredQuery::default());

        let err = db.select(&query).unwrap_err();
        assert!(err.is_invalid_option());
        assert_eq!(err.origin(), Some(Origin::new("Connection", "select")));
    }

    #[rstest]
    fn test_transaction_runs_body_between_begin_and_commit() {
        let driver = MockDriver::new(Dialect::mysql());
        let mut db = Connection::new(driver.clone());

        db.transaction(|db| db.change("UPDATE a SET x = 1", &[])).unwrap();

        let calls = driver.calls();
        assert_eq!(calls.first(), Some(&Call::Begin));
        assert_eq!(calls.last(), Some(&Call::Commit));
        assert!(!db.transaction_state().is_active());
    }

    #[rstest]
    fn test_shared_state_is_visible() {
        let state = TransactionState::new();
        let db = Connection::with_state(MockDriver::new(Dialect::mysql()), state.clone());
        state.enter();
        assert!(db.transaction_state().is_active());
    }
}
