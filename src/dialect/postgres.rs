//! PostgreSQL.

use super::{SqlDialect, UpsertStrategy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    // PostgreSQL rejects integers in boolean context.
    fn always_true(&self) -> &'static str {
        "TRUE"
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> Option<String> {
        match (limit, offset) {
            (0, 0) => None,
            (limit, 0) => Some(format!("LIMIT {}", limit)),
            (0, offset) => Some(format!("OFFSET {}", offset)),
            (limit, offset) => Some(format!("LIMIT {} OFFSET {}", limit, offset)),
        }
    }

    fn returning_clause(&self, column: &str) -> Option<String> {
        Some(format!("RETURNING {}", self.quote_identifier(column)))
    }

    fn upsert_strategy(&self, _server_version: Option<&str>) -> UpsertStrategy {
        UpsertStrategy::OnConflict
    }
}
