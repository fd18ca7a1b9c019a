use std::error::Error;

use serde::Serialize;
use tracing::debug;

use super::ChangeCmd;
use crate::backend::Database;
use crate::commands::{open_database, read_descriptor, Execute};
use crate::query::Statement;

/// Result of the change command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeResult {
    pub statement: &'static str,
    pub table: String,
    pub affected: u64,
    /// Generated key reported by an insert with `returning`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
}

/// Parse `descriptor` as a write and apply it to `db`.
pub fn apply_descriptor(db: &mut impl Database, descriptor: &serde_json::Value) -> Result<ChangeResult, Box<dyn Error>> {
    let statement = Statement::from_descriptor(descriptor)?;
    let result = match &statement {
        Statement::Insert { table, row, returning } => ChangeResult {
            statement: "insert",
            table: table.clone(),
            affected: 1,
            insert_id: db.insert(table, row, returning.as_deref())?,
        },
        Statement::Update {
            table,
            changes,
            conditions,
        } => ChangeResult {
            statement: "update",
            table: table.clone(),
            affected: db.update(table, changes, conditions)?,
            insert_id: None,
        },
    };
    debug!(statement = result.statement, table = %result.table, affected = result.affected, "change applied");
    Ok(result)
}

impl Execute for ChangeCmd {
    type Output = ChangeResult;

    fn execute(self, db_url: Option<&str>) -> Result<Self::Output, Box<dyn Error>> {
        let descriptor = read_descriptor(self.file.as_deref())?;
        let mut db = open_database(db_url)?;
        apply_descriptor(&mut db, &descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, Db};
    use crate::query::Query;
    use crate::value::Value;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::io::Write;

    #[fixture]
    fn db() -> Db {
        let mut db = DatabaseConfig::Memory.connect().unwrap();
        db.change(
            "CREATE TABLE account (id INTEGER PRIMARY KEY, name TEXT, balance INTEGER NOT NULL DEFAULT 0)",
            &[],
        )
        .unwrap();
        db.change(
            "INSERT INTO account (id, name, balance) VALUES (1, 'ada', 100), (2, 'grace', 250), (3, 'linus', 0)",
            &[],
        )
        .unwrap();
        db
    }

    fn balances(db: &mut Db) -> Vec<Value> {
        db.fetch_all_and_flatten(&Query::raw("SELECT balance FROM account ORDER BY id", vec![]))
            .unwrap()
    }

    #[rstest]
    fn test_update_descriptor_applies(mut db: Db) {
        let result = apply_descriptor(
            &mut db,
            &json!({
                "table": "account",
                "changes": {":balance: = :balance: + ?": 5},
                "where": {":balance: > ?": 50}
            }),
        )
        .unwrap();

        assert_eq!(result.statement, "update");
        assert_eq!(result.affected, 2);
        assert_eq!(balances(&mut db), vec![Value::Int(105), Value::Int(255), Value::Int(0)]);
    }

    #[rstest]
    fn test_update_without_where_touches_every_row(mut db: Db) {
        let result = apply_descriptor(&mut db, &json!({"table": "account", "changes": {"balance": 1}})).unwrap();
        assert_eq!(result.affected, 3);
    }

    #[rstest]
    fn test_insert_descriptor_reports_id(mut db: Db) {
        let result = apply_descriptor(
            &mut db,
            &json!({"table": "account", "values": {"name": "barbara"}, "returning": "id"}),
        )
        .unwrap();

        assert_eq!(result.statement, "insert");
        assert_eq!(result.insert_id.as_deref(), Some("4"));
        assert_eq!(balances(&mut db).len(), 4);
    }

    #[rstest]
    fn test_invalid_descriptor_leaves_data(mut db: Db) {
        let err = apply_descriptor(&mut db, &json!({"table": "account", "changes": {}})).unwrap_err();
        assert!(err.to_string().contains("no changes specified"));
        assert_eq!(balances(&mut db), vec![Value::Int(100), Value::Int(250), Value::Int(0)]);
    }

    #[rstest]
    fn test_execute_with_db_option() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"table": "missing", "values": {{"x": 1}}}}"#).unwrap();

        let cmd = ChangeCmd {
            file: Some(file.path().to_path_buf()),
        };
        let err = cmd.execute(Some(":memory:")).unwrap_err();
        assert!(err.to_string().contains("missing"), "{}", err);
    }
}
