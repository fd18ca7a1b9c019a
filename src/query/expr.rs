//! Expression classification and `:identifier:` substitution.
//!
//! Descriptor strings are either bare identifiers (`name`, `a.id`), which are
//! quoted wholesale, or raw SQL fragments. Which one a string is depends on the
//! markup characters it contains, and the relevant set differs between the
//! SELECT list and WHERE keys.

use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::{Dialect, SqlDialect};

/// `:name:` or `:table.column:` inside a raw fragment.
static IDENTIFIER_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_$]*(?:\.(?:[A-Za-z_][A-Za-z0-9_$]*|\*))*):")
        .expect("identifier span pattern is valid")
});

/// Characters that turn a field, group or order entry into a raw expression.
pub const FIELD_MARKUP: &[char] = &[':', ' ', '(', ')', '*'];

/// Characters that turn a WHERE key into a raw predicate.
pub const WHERE_MARKUP: &[char] = &[' ', '=', '<', '>', '(', ')'];

/// Replace every `:name:` span in `expr` with `quote(name)`.
pub fn substitute_identifiers(expr: &str, quote: impl Fn(&str) -> String) -> String {
    IDENTIFIER_SPAN
        .replace_all(expr, |caps: &regex::Captures<'_>| quote(&caps[1]))
        .into_owned()
}

/// The name inside `expr` when all of `expr` is one `:name:` span.
pub fn whole_identifier(expr: &str) -> Option<&str> {
    IDENTIFIER_SPAN
        .captures(expr)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == expr.len()))
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str())
}

pub fn has_markup(expr: &str, markup: &[char]) -> bool {
    expr.contains(markup)
}

/// A field-like expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Column or `table.column`, quoted as a whole.
    Identifier(String),
    /// SQL fragment; only its `:name:` spans are quoted.
    Raw(String),
}

impl Expr {
    /// Classify a field, group or order entry.
    pub fn parse(expr: impl Into<String>) -> Self {
        let expr = expr.into();
        if has_markup(&expr, FIELD_MARKUP) {
            Expr::Raw(expr)
        } else {
            Expr::Identifier(expr)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Expr::Identifier(s) | Expr::Raw(s) => s,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Expr::Raw(_))
    }

    pub fn to_sql(&self, dialect: &Dialect) -> String {
        match self {
            Expr::Identifier(name) => dialect.quote_identifier(name),
            Expr::Raw(expr) => dialect.quote_expression(expr),
        }
    }
}

impl From<&str> for Expr {
    fn from(expr: &str) -> Self {
        Expr::parse(expr)
    }
}

impl From<String> for Expr {
    fn from(expr: String) -> Self {
        Expr::parse(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("name", false)]
    #[case("a.id", false)]
    #[case("COUNT(*)", true)]
    #[case(":a.name:", true)]
    #[case("a.*", true)]
    #[case("first_name || last_name", true)]
    fn test_parse_classifies_fields(#[case] input: &str, #[case] raw: bool) {
        assert_eq!(Expr::parse(input).is_raw(), raw);
    }

    #[rstest]
    fn test_substitute_every_span() {
        let out = substitute_identifiers(":a: + :b.c: - :a:", |n| format!("[{}]", n));
        assert_eq!(out, "[a] + [b.c] - [a]");
    }

    #[rstest]
    fn test_substitute_leaves_casts_and_placeholders() {
        let out = substitute_identifiers("x::int = ? AND :y: = 'a:b'", |n| format!("<{}>", n));
        assert_eq!(out, "x::int = ? AND <y> = 'a:b'");
    }

    #[rstest]
    fn test_to_sql() {
        let pg = Dialect::postgres();
        assert_eq!(Expr::parse("a.id").to_sql(&pg), "\"a\".\"id\"");
        assert_eq!(Expr::parse("MAX(:a.id:)").to_sql(&pg), "MAX(\"a\".\"id\")");
        assert_eq!(Expr::parse("COUNT(*)").to_sql(&pg), "COUNT(*)");
    }

    #[rstest]
    #[case(":a.id:", Some("a.id"))]
    #[case(":name:", Some("name"))]
    #[case(":a: + :b:", None)]
    #[case(":a.id: > ?", None)]
    #[case("a.id", None)]
    fn test_whole_identifier(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(whole_identifier(input), expected);
    }

    #[rstest]
    fn test_where_markup() {
        assert!(has_markup("a.id >= ?", WHERE_MARKUP));
        assert!(!has_markup("a.id", WHERE_MARKUP));
    }
}
