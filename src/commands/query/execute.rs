use std::error::Error;

use serde::Serialize;
use tracing::debug;

use super::QueryCmd;
use crate::backend::Database;
use crate::commands::{open_database, read_descriptor, Execute};
use crate::query::Query;
use crate::value::Row;

/// Result of the query command
#[derive(Debug, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows.first().map(|r| r.columns().to_vec()).unwrap_or_default();
        Self {
            columns,
            row_count: rows.len(),
            rows,
        }
    }
}

/// Run `descriptor` on `db` and collect every row.
pub fn run_descriptor(db: &mut impl Database, descriptor: &serde_json::Value) -> Result<QueryResult, Box<dyn Error>> {
    let query = Query::from_descriptor(descriptor)?;
    let rows = db.fetch_all(&query)?;
    debug!(rows = rows.len(), "query finished");
    Ok(QueryResult::from_rows(rows))
}

impl Execute for QueryCmd {
    type Output = QueryResult;

    fn execute(self, db_url: Option<&str>) -> Result<Self::Output, Box<dyn Error>> {
        let descriptor = read_descriptor(self.file.as_deref())?;
        let mut db = open_database(db_url)?;
        run_descriptor(&mut db, &descriptor)
    }
}
