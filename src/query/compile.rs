//! Compilation of the query AST into SQL fragments and parameter lists.
//!
//! Every `build_*` function appends the values it binds to `params` in the
//! same order its `?` placeholders appear in the returned fragment.

use crate::dialect::{Dialect, SqlDialect, UpsertStrategy};
use crate::error::InvalidOption;
use crate::value::{Row, Value};

use super::{Assignment, CompiledQuery, Condition, Expr, Field, OrderBy, StructuredQuery, TableRef};

/// Leading words that make a table entry a join rather than a new FROM item.
const JOIN_KEYWORDS: &[&str] = &[
    "JOIN",
    "INNER",
    "LEFT",
    "RIGHT",
    "FULL",
    "OUTER",
    "CROSS",
    "NATURAL",
    "STRAIGHT_JOIN",
];

/// Quote an output name without splitting it on dots.
fn quote_alias(dialect: &Dialect, alias: &str) -> String {
    let q = dialect.quote_char();
    format!("{q}{}{q}", alias.replace(q, &format!("{q}{q}")))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

pub fn build_field_selection(dialect: &Dialect, fields: &[Field]) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }

    fields
        .iter()
        .map(|field| {
            let sql = field.expr.to_sql(dialect);
            match (&field.alias, &field.expr) {
                (None, _) => sql,
                (Some(alias), Expr::Raw(_)) => format!("({}) AS {}", sql, quote_alias(dialect, alias)),
                (Some(alias), Expr::Identifier(_)) => format!("{} AS {}", sql, quote_alias(dialect, alias)),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_join(expr: &str) -> bool {
    expr.split_whitespace()
        .next()
        .is_some_and(|word| JOIN_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)))
}

fn table_sql(dialect: &Dialect, expr: &str) -> String {
    if !expr.contains(' ') {
        return dialect.quote_identifier(expr);
    }
    if expr.contains(':') {
        return dialect.quote_expression(expr);
    }
    match expr.split_once(' ') {
        Some((name, alias)) if !alias.contains(' ') && !name.is_empty() && !alias.is_empty() => {
            format!("{} {}", dialect.quote_identifier(name), dialect.quote_identifier(alias))
        }
        _ => expr.to_string(),
    }
}

pub fn build_table_joins(
    dialect: &Dialect,
    tables: &[TableRef],
    params: &mut Vec<Value>,
) -> Result<String, InvalidOption> {
    if tables.is_empty() {
        return Err(InvalidOption::new("no tables specified"));
    }

    let mut sql = String::new();
    for (idx, table) in tables.iter().enumerate() {
        if table.expr.trim().is_empty() {
            return Err(InvalidOption::new("empty table expression"));
        }
        if table.binds.iter().any(Value::is_null) {
            return Err(InvalidOption::new(format!(
                "table '{}' cannot bind NULL",
                table.expr
            )));
        }
        if idx > 0 {
            sql.push_str(if is_join(&table.expr) { " " } else { ", " });
        }
        sql.push_str(&table_sql(dialect, &table.expr));
        params.extend(table.binds.iter().cloned());
    }
    Ok(sql)
}

fn condition_sql(
    dialect: &Dialect,
    condition: &Condition,
    params: &mut Vec<Value>,
) -> Result<String, InvalidOption> {
    match condition {
        Condition::Eq { field, value } => {
            params.push(value.clone());
            Ok(format!("{}=?", dialect.quote_identifier(field)))
        }
        Condition::In { field, values } => {
            if values.is_empty() {
                return Err(InvalidOption::new(format!(
                    "empty value list for '{}'",
                    field
                )));
            }
            params.extend(values.iter().cloned());
            Ok(format!(
                "{} IN ({})",
                dialect.quote_identifier(field),
                placeholders(values.len())
            ))
        }
        Condition::IsNull { field } => Ok(format!("{} IS NULL", dialect.quote_identifier(field))),
        Condition::Raw { expr, binds } => {
            if expr.trim().is_empty() {
                return Err(InvalidOption::new("empty where expression"));
            }
            params.extend(binds.iter().cloned());
            Ok(format!("({})", dialect.quote_expression(expr)))
        }
    }
}

/// Conjunction of `conditions`; the dialect's always-true literal when empty.
pub fn build_where(
    dialect: &Dialect,
    conditions: &[Condition],
    params: &mut Vec<Value>,
) -> Result<String, InvalidOption> {
    if conditions.is_empty() {
        return Ok(dialect.always_true().to_string());
    }
    let clauses = conditions
        .iter()
        .map(|c| condition_sql(dialect, c, params))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(clauses.join(" AND "))
}

pub fn build_changes(
    dialect: &Dialect,
    changes: &[Assignment],
    params: &mut Vec<Value>,
) -> Result<String, InvalidOption> {
    let mut parts = Vec::with_capacity(changes.len());
    for change in changes {
        match change {
            Assignment::Set { field, value } => {
                if field.is_empty() {
                    return Err(InvalidOption::new("empty column name in changes"));
                }
                params.push(value.clone());
                parts.push(format!("{}=?", dialect.quote_identifier(field)));
            }
            Assignment::Raw { expr, binds } => {
                if !expr.contains('=') {
                    return Err(InvalidOption::new(format!(
                        "change '{}' is not an assignment",
                        expr
                    )));
                }
                params.extend(binds.iter().cloned());
                parts.push(dialect.quote_expression(expr));
            }
        }
    }
    Ok(parts.join(","))
}

pub fn build_group_by(dialect: &Dialect, group: &[Expr]) -> String {
    group
        .iter()
        .map(|e| e.to_sql(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_order_by(dialect: &Dialect, order: &[OrderBy]) -> String {
    order
        .iter()
        .map(|o| format!("{} {}", o.expr.to_sql(dialect), o.direction.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn compile_select(dialect: &Dialect, query: &StructuredQuery) -> Result<CompiledQuery, InvalidOption> {
    let mut params = Vec::new();

    let fields = build_field_selection(dialect, &query.fields);
    let tables = build_table_joins(dialect, &query.tables, &mut params)?;
    let mut sql = format!("SELECT {} FROM {}", fields, tables);

    if !query.conditions.is_empty() {
        let predicate = build_where(dialect, &query.conditions, &mut params)?;
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }
    if !query.group.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&build_group_by(dialect, &query.group));
    }
    if !query.order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&build_order_by(dialect, &query.order));
    }
    if let Some(limit) = dialect.limit_clause(query.limit, query.offset) {
        sql.push(' ');
        sql.push_str(&limit);
    }
    if query.lock {
        sql.push(' ');
        sql.push_str(dialect.lock_clause());
    }

    Ok(CompiledQuery {
        sql: dialect.finish_select(sql),
        params,
    })
}

fn require_table(table: &str) -> Result<(), InvalidOption> {
    if table.trim().is_empty() {
        return Err(InvalidOption::new("table name must not be empty"));
    }
    Ok(())
}

/// `INSERT INTO t (cols) VALUES (?,…)`, plus the dialect's RETURNING clause
/// when `returning` names a generated column.
pub fn compile_insert(
    dialect: &Dialect,
    table: &str,
    row: &Row,
    returning: Option<&str>,
) -> Result<CompiledQuery, InvalidOption> {
    require_table(table)?;
    if row.is_empty() {
        return Err(InvalidOption::new(format!("no values to insert into '{}'", table)));
    }

    let columns = row
        .columns()
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(",");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_identifier(table),
        columns,
        placeholders(row.len())
    );
    if let Some(clause) = returning.and_then(|col| dialect.returning_clause(col)) {
        sql.push(' ');
        sql.push_str(&clause);
    }

    Ok(CompiledQuery {
        sql,
        params: row.values().to_vec(),
    })
}

pub fn compile_update(
    dialect: &Dialect,
    table: &str,
    changes: &[Assignment],
    conditions: &[Condition],
) -> Result<CompiledQuery, InvalidOption> {
    require_table(table)?;
    if changes.is_empty() {
        return Err(InvalidOption::new(format!("no changes given for '{}'", table)));
    }

    let mut params = Vec::new();
    let set = build_changes(dialect, changes, &mut params)?;
    let mut sql = format!("UPDATE {} SET {}", dialect.quote_identifier(table), set);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&build_where(dialect, conditions, &mut params)?);
    }
    Ok(CompiledQuery { sql, params })
}

/// DELETE always carries a WHERE clause, the always-true literal at minimum.
pub fn compile_delete(
    dialect: &Dialect,
    table: &str,
    conditions: &[Condition],
) -> Result<CompiledQuery, InvalidOption> {
    require_table(table)?;
    let mut params = Vec::new();
    let predicate = build_where(dialect, conditions, &mut params)?;
    Ok(CompiledQuery {
        sql: format!("DELETE FROM {} WHERE {}", dialect.quote_identifier(table), predicate),
        params,
    })
}

/// Update list used when the caller passes none: every non-index column.
pub fn default_upsert_updates(row: &Row, index: &[&str]) -> Vec<Assignment> {
    row.iter()
        .filter(|(column, _)| !index.contains(column))
        .map(|(column, value)| Assignment::set(column, value.clone()))
        .collect()
}

/// `"id"="id","id2"="id2"`: a no-op SET list for when nothing should change.
fn self_assignment(dialect: &Dialect, index: &[&str]) -> String {
    index
        .iter()
        .map(|col| {
            let quoted = dialect.quote_identifier(col);
            format!("{}={}", quoted, quoted)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Statements that carry out one `insert_or_update`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertPlan {
    /// One native upsert statement.
    Native(CompiledQuery),
    /// Run `update`; run `insert` only if it changed no rows.
    Emulated {
        update: CompiledQuery,
        insert: CompiledQuery,
    },
}

pub fn plan_upsert(
    dialect: &Dialect,
    strategy: UpsertStrategy,
    table: &str,
    row: &Row,
    index: &[&str],
    updates: Option<&[Assignment]>,
) -> Result<UpsertPlan, InvalidOption> {
    require_table(table)?;
    if row.is_empty() {
        return Err(InvalidOption::new(format!("no values to upsert into '{}'", table)));
    }
    if index.is_empty() {
        return Err(InvalidOption::new("upsert requires at least one index column"));
    }
    if let Some(missing) = index.iter().find(|col| !row.contains(col)) {
        return Err(InvalidOption::new(format!(
            "index column '{}' is missing from the row",
            missing
        )));
    }

    let updates = match updates {
        Some(updates) => updates.to_vec(),
        None => default_upsert_updates(row, index),
    };

    match strategy {
        UpsertStrategy::OnDuplicateKey => {
            let mut compiled = compile_insert(dialect, table, row, None)?;
            let set = if updates.is_empty() {
                self_assignment(dialect, index)
            } else {
                build_changes(dialect, &updates, &mut compiled.params)?
            };
            compiled.sql.push_str(" ON DUPLICATE KEY UPDATE ");
            compiled.sql.push_str(&set);
            Ok(UpsertPlan::Native(compiled))
        }
        UpsertStrategy::OnConflict => {
            let mut compiled = compile_insert(dialect, table, row, None)?;
            let target = index
                .iter()
                .map(|col| dialect.quote_identifier(col))
                .collect::<Vec<_>>()
                .join(",");
            compiled.sql.push_str(&format!(" ON CONFLICT ({})", target));
            if updates.is_empty() {
                compiled.sql.push_str(" DO NOTHING");
            } else {
                let set = build_changes(dialect, &updates, &mut compiled.params)?;
                compiled.sql.push_str(" DO UPDATE SET ");
                compiled.sql.push_str(&set);
            }
            Ok(UpsertPlan::Native(compiled))
        }
        UpsertStrategy::Emulated => {
            let conditions = index
                .iter()
                .map(|col| Condition::eq(*col, row.get(col).cloned().unwrap_or_default()))
                .collect::<Vec<_>>();
            let update = if updates.is_empty() {
                let mut params = Vec::new();
                let predicate = build_where(dialect, &conditions, &mut params)?;
                CompiledQuery {
                    sql: format!(
                        "UPDATE {} SET {} WHERE {}",
                        dialect.quote_identifier(table),
                        self_assignment(dialect, index),
                        predicate
                    ),
                    params,
                }
            } else {
                compile_update(dialect, table, &updates, &conditions)?
            };
            let insert = compile_insert(dialect, table, row, None)?;
            Ok(UpsertPlan::Emulated { update, insert })
        }
    }
}
