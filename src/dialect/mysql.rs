//! MySQL / MariaDB.

use super::{SqlDialect, UpsertStrategy};

/// Largest row count MySQL accepts; stands in for "no limit" when only an offset is set.
const UNBOUNDED_LIMIT: &str = "18446744073709551615";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> Option<String> {
        match (limit, offset) {
            (0, 0) => None,
            (limit, 0) => Some(format!("LIMIT {}", limit)),
            (0, offset) => Some(format!("LIMIT {} OFFSET {}", UNBOUNDED_LIMIT, offset)),
            (limit, offset) => Some(format!("LIMIT {} OFFSET {}", limit, offset)),
        }
    }

    fn upsert_strategy(&self, _server_version: Option<&str>) -> UpsertStrategy {
        UpsertStrategy::OnDuplicateKey
    }
}
