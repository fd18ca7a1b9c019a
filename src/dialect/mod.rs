//! SQL dialect differences between MySQL, PostgreSQL and SQLite.
//!
//! The query compiler emits one SQL shape for every engine and asks the
//! dialect for the parts that diverge: identifier quoting, the LIMIT/OFFSET
//! syntax, the row-lock clause, the always-true predicate, how generated keys
//! come back from an insert, and which UPSERT strategy the server supports.
//!
//! Dispatch goes through [`Dialect`], an `enum_dispatch` enum, so a dialect is
//! a plain `Copy` value that connections and the CLI can pass around freely.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::query::expr::substitute_identifiers;

/// How `insert_or_update` is carried out on a given server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStrategy {
    /// `INSERT ... ON DUPLICATE KEY UPDATE ...`
    OnDuplicateKey,
    /// `INSERT ... ON CONFLICT (...) DO UPDATE SET ...` / `DO NOTHING`
    OnConflict,
    /// `UPDATE`, then `INSERT` when nothing was updated, inside a transaction.
    Emulated,
}

/// Engine-specific SQL syntax.
#[enum_dispatch]
pub trait SqlDialect {
    /// Lowercase engine name, as accepted by [`Dialect::from_str`].
    fn name(&self) -> &'static str;

    /// Character that delimits quoted identifiers.
    fn quote_char(&self) -> char;

    /// Quote an identifier. Dotted names are quoted per part (`a.id` → `"a"."id"`),
    /// a `*` part is left as is, and embedded quote characters are doubled.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        let escaped = format!("{q}{q}");
        name.split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    format!("{q}{}{q}", part.replace(q, &escaped))
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Replace every `:name:` span in `expr` with the quoted identifier.
    fn quote_expression(&self, expr: &str) -> String {
        substitute_identifiers(expr, |name| self.quote_identifier(name))
    }

    /// Predicate used when a WHERE clause has no conditions.
    fn always_true(&self) -> &'static str {
        "1"
    }

    /// LIMIT/OFFSET tail. `0` means "not set" for both values.
    fn limit_clause(&self, limit: u64, offset: u64) -> Option<String>;

    /// Row-locking suffix for `SELECT`.
    fn lock_clause(&self) -> &'static str {
        "FOR UPDATE"
    }

    /// Final rewrite of a compiled `SELECT`.
    fn finish_select(&self, sql: String) -> String {
        sql
    }

    /// Clause appended to an `INSERT` to read back a generated column, if the
    /// engine supports it. Engines without it rely on `Driver::last_insert_id`.
    fn returning_clause(&self, _column: &str) -> Option<String> {
        None
    }

    /// Statement whose single result cell is the server version, when the
    /// upsert strategy depends on it.
    fn version_probe(&self) -> Option<&'static str> {
        None
    }

    fn upsert_strategy(&self, server_version: Option<&str>) -> UpsertStrategy;
}

/// One of the supported SQL dialects.
#[enum_dispatch(SqlDialect)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql(MySql),
    Postgres(Postgres),
    Sqlite(Sqlite),
}

impl Dialect {
    pub const fn mysql() -> Self {
        Dialect::MySql(MySql)
    }

    pub const fn postgres() -> Self {
        Dialect::Postgres(Postgres)
    }

    pub const fn sqlite() -> Self {
        Dialect::Sqlite(Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::mysql()),
            "postgres" | "postgresql" | "pgsql" => Ok(Dialect::postgres()),
            "sqlite" | "sqlite3" => Ok(Dialect::sqlite()),
            other => Err(format!(
                "unknown dialect '{}' (expected mysql, postgres or sqlite)",
                other
            )),
        }
    }
}

/// Parse `major.minor.patch`, tolerating missing trailing parts.
pub(crate) fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.trim().split('.').map(|p| p.trim().parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Dialect::mysql(), "a.id", "`a`.`id`")]
    #[case(Dialect::postgres(), "a.id", "\"a\".\"id\"")]
    #[case(Dialect::sqlite(), "account", "\"account\"")]
    #[case(Dialect::postgres(), "a.*", "\"a\".*")]
    #[case(Dialect::postgres(), "we\"ird", "\"we\"\"ird\"")]
    #[case(Dialect::mysql(), "we`ird", "`we``ird`")]
    fn test_quote_identifier(#[case] dialect: Dialect, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(dialect.quote_identifier(input), expected);
    }

    #[rstest]
    fn test_quote_expression_substitutes_all_spans() {
        let sql = Dialect::mysql().quote_expression(":a.id: = :b.account_id: AND :b.kind: = ?");
        assert_eq!(sql, "`a`.`id` = `b`.`account_id` AND `b`.`kind` = ?");
    }

    #[rstest]
    #[case(Dialect::mysql(), 10, 0, Some("LIMIT 10"))]
    #[case(Dialect::mysql(), 10, 20, Some("LIMIT 10 OFFSET 20"))]
    #[case(Dialect::mysql(), 0, 5, Some("LIMIT 18446744073709551615 OFFSET 5"))]
    #[case(Dialect::postgres(), 0, 5, Some("OFFSET 5"))]
    #[case(Dialect::sqlite(), 0, 5, Some("LIMIT -1 OFFSET 5"))]
    #[case(Dialect::sqlite(), 0, 0, None)]
    fn test_limit_clause(
        #[case] dialect: Dialect,
        #[case] limit: u64,
        #[case] offset: u64,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(dialect.limit_clause(limit, offset).as_deref(), expected);
    }

    #[rstest]
    fn test_always_true_per_dialect() {
        assert_eq!(Dialect::mysql().always_true(), "1");
        assert_eq!(Dialect::sqlite().always_true(), "1");
        assert_eq!(Dialect::postgres().always_true(), "TRUE");
    }

    #[rstest]
    #[case("3.24.0", UpsertStrategy::OnConflict)]
    #[case("3.45.1", UpsertStrategy::OnConflict)]
    #[case("3.23.1", UpsertStrategy::Emulated)]
    #[case("3.8", UpsertStrategy::Emulated)]
    #[case("garbage", UpsertStrategy::Emulated)]
    fn test_sqlite_upsert_strategy(#[case] version: &str, #[case] expected: UpsertStrategy) {
        assert_eq!(Dialect::sqlite().upsert_strategy(Some(version)), expected);
    }

    #[rstest]
    fn test_server_upsert_strategies() {
        assert_eq!(Dialect::mysql().upsert_strategy(None), UpsertStrategy::OnDuplicateKey);
        assert_eq!(Dialect::postgres().upsert_strategy(None), UpsertStrategy::OnConflict);
        assert_eq!(Dialect::sqlite().upsert_strategy(None), UpsertStrategy::Emulated);
    }

    #[rstest]
    #[case("MySQL", Dialect::mysql())]
    #[case("postgresql", Dialect::postgres())]
    #[case("sqlite3", Dialect::sqlite())]
    fn test_from_str(#[case] input: &str, #[case] expected: Dialect) {
        assert_eq!(input.parse::<Dialect>().unwrap(), expected);
    }

    #[rstest]
    fn test_from_str_unknown() {
        assert!("oracle".parse::<Dialect>().unwrap_err().contains("oracle"));
    }

    #[rstest]
    fn test_parse_version() {
        assert_eq!(parse_version("3.24.0"), Some((3, 24, 0)));
        assert_eq!(parse_version("3.8"), Some((3, 8, 0)));
        assert_eq!(parse_version("x.1"), None);
    }
}
