//! SQLite.
//!
//! Native `ON CONFLICT ... DO UPDATE` arrived in SQLite 3.24.0; older
//! libraries get the emulated upsert. Row locks do not exist: SQLite locks the
//! whole database for a writer, so `FOR UPDATE` is dropped from selects.

use super::{parse_version, SqlDialect, UpsertStrategy};

const NATIVE_UPSERT_SINCE: (u32, u32, u32) = (3, 24, 0);
const LOCK_SUFFIX: &str = "FOR UPDATE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn limit_clause(&self, limit: u64, offset: u64) -> Option<String> {
        match (limit, offset) {
            (0, 0) => None,
            (limit, 0) => Some(format!("LIMIT {}", limit)),
            (0, offset) => Some(format!("LIMIT -1 OFFSET {}", offset)),
            (limit, offset) => Some(format!("LIMIT {} OFFSET {}", limit, offset)),
        }
    }

    fn finish_select(&self, sql: String) -> String {
        let trimmed = sql.trim_end();
        let split = trimmed.len().saturating_sub(LOCK_SUFFIX.len());
        match trimmed.get(split..) {
            Some(tail) if tail.eq_ignore_ascii_case(LOCK_SUFFIX) => {
                trimmed[..split].trim_end().to_string()
            }
            _ => sql,
        }
    }

    fn version_probe(&self) -> Option<&'static str> {
        Some("SELECT sqlite_version()")
    }

    fn upsert_strategy(&self, server_version: Option<&str>) -> UpsertStrategy {
        match server_version.and_then(parse_version) {
            Some(version) if version >= NATIVE_UPSERT_SINCE => UpsertStrategy::OnConflict,
            _ => UpsertStrategy::Emulated,
        }
    }
}
