//! JSON descriptor parsing.
//!
//! A descriptor is the loosely-typed document form of a query:
//!
//! ```json
//! {
//!   "fields": ["id", {"accountName": "a.name"}],
//!   "tables": ["account a"],
//!   "where": {"a.id": [1, 2], "a.deleted": null},
//!   "order": {"a.name": "DESC"},
//!   "limit": 10
//! }
//! ```
//!
//! Arrays hold unkeyed entries (strings) and keyed entries (objects), objects
//! hold keyed entries. Everything is validated here, so the compiler only ever
//! sees a well-formed [`StructuredQuery`].
//!
//! Writes have their own descriptors, told apart by their payload key:
//!
//! ```json
//! {"table": "account", "changes": {"name": "John"}, "where": {"id": 2}}
//! {"table": "account", "values": {"name": "John"}, "returning": "id"}
//! ```

use serde_json::{Map, Value as Json};

use crate::error::InvalidOption;
use crate::value::{Row, Value};

use super::expr::{has_markup, whole_identifier, WHERE_MARKUP};
use super::{Assignment, Condition, Direction, Expr, Field, OrderBy, Query, Statement, StructuredQuery, TableRef};

/// Option keys a SELECT descriptor accepts, with their defaults.
pub fn select_defaults() -> Map<String, Json> {
    let mut defaults = Map::new();
    defaults.insert("fields".into(), Json::Array(Vec::new()));
    defaults.insert("tables".into(), Json::Array(Vec::new()));
    defaults.insert("where".into(), Json::Array(Vec::new()));
    defaults.insert("group".into(), Json::Array(Vec::new()));
    defaults.insert("order".into(), Json::Array(Vec::new()));
    defaults.insert("limit".into(), Json::from(0));
    defaults.insert("offset".into(), Json::from(0));
    defaults.insert("lock".into(), Json::Bool(false));
    defaults
}

/// Option keys an UPDATE descriptor accepts.
pub fn update_defaults() -> Map<String, Json> {
    let mut defaults = Map::new();
    defaults.insert("table".into(), Json::Null);
    defaults.insert("changes".into(), Json::Array(Vec::new()));
    defaults.insert("where".into(), Json::Array(Vec::new()));
    defaults
}

/// Option keys an INSERT descriptor accepts.
pub fn insert_defaults() -> Map<String, Json> {
    let mut defaults = Map::new();
    defaults.insert("table".into(), Json::Null);
    defaults.insert("values".into(), Json::Object(Map::new()));
    defaults.insert("returning".into(), Json::Null);
    defaults
}

/// Singular shortcuts and the option they stand for.
const SHORTCUTS: &[(&str, &str)] = &[("table", "tables"), ("field", "fields")];

fn coerce_count(key: &str, value: &Json) -> Result<u64, InvalidOption> {
    match value {
        Json::Null => Ok(0),
        Json::Number(n) => n.as_u64().ok_or_else(|| {
            InvalidOption::new(format!("'{}' must be a non-negative integer, got {}", key, n))
        }),
        Json::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<u64>().map_err(|_| {
                InvalidOption::new(format!("'{}' is out of range: {}", key, s))
            })
        }
        other => Err(InvalidOption::new(format!(
            "'{}' must be a non-negative integer, got {}",
            key, other
        ))),
    }
}

fn coerce_flag(key: &str, value: &Json) -> Result<bool, InvalidOption> {
    match value {
        Json::Null => Ok(false),
        Json::Bool(b) => Ok(*b),
        Json::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Json::Number(n) if n.as_u64() == Some(1) => Ok(true),
        other => Err(InvalidOption::new(format!(
            "'{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

fn is_empty_option(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        Json::Array(a) => a.is_empty(),
        Json::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Validate `supplied` against the keys of `defaults` and return the merged,
/// coerced option set.
///
/// Unknown keys are rejected. `table` and `field` are accepted as shortcuts for
/// `tables` and `fields`, but not together with them. `limit` and `offset`
/// become non-negative integers, `lock` a boolean. When `defaults` has a
/// `tables` key, the result must name at least one table.
pub fn verify_and_process_options(
    defaults: &Map<String, Json>,
    supplied: &Map<String, Json>,
) -> Result<Map<String, Json>, InvalidOption> {
    let mut options = defaults.clone();

    for (key, value) in supplied {
        let target = SHORTCUTS
            .iter()
            .find(|(short, plural)| *short == key.as_str() && defaults.contains_key(*plural))
            .map(|(short, plural)| {
                if supplied.contains_key(*plural) {
                    Err(InvalidOption::new(format!(
                        "'{}' and '{}' are mutually exclusive",
                        short, plural
                    )))
                } else {
                    Ok(*plural)
                }
            })
            .transpose()?
            .unwrap_or(key.as_str());

        if !defaults.contains_key(target) {
            return Err(InvalidOption::new(format!("unknown option '{}'", key)));
        }

        let value = match target {
            "limit" | "offset" => Json::from(coerce_count(target, value)?),
            "lock" => Json::Bool(coerce_flag(target, value)?),
            _ => value.clone(),
        };
        options.insert(target.to_string(), value);
    }

    if options.get("tables").is_some_and(is_empty_option) {
        return Err(InvalidOption::new("no tables specified"));
    }
    Ok(options)
}

/// One descriptor list entry.
enum Entry<'a> {
    Unkeyed(&'a str),
    Keyed(&'a str, &'a Json),
}

fn entries<'a>(key: &str, value: &'a Json) -> Result<Vec<Entry<'a>>, InvalidOption> {
    match value {
        Json::Null => Ok(Vec::new()),
        Json::String(s) => Ok(vec![Entry::Unkeyed(s)]),
        Json::Object(map) => Ok(map.iter().map(|(k, v)| Entry::Keyed(k, v)).collect()),
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Json::String(s) => out.push(Entry::Unkeyed(s)),
                    Json::Object(map) => out.extend(map.iter().map(|(k, v)| Entry::Keyed(k, v))),
                    other => {
                        return Err(InvalidOption::new(format!(
                            "invalid entry in '{}': {}",
                            key, other
                        )));
                    }
                }
            }
            Ok(out)
        }
        other => Err(InvalidOption::new(format!(
            "'{}' must be a string, list or object, got {}",
            key, other
        ))),
    }
}

fn scalar(context: &str, value: &Json) -> Result<Value, InvalidOption> {
    Value::from_json(value).map_err(|e| InvalidOption::new(format!("{}: {}", context, e)))
}

fn required_table(value: &Json) -> Result<String, InvalidOption> {
    match value {
        Json::String(table) if !table.trim().is_empty() => Ok(table.clone()),
        Json::Null => Err(InvalidOption::new("no table specified")),
        other => Err(InvalidOption::new(format!("'table' must be a table name, got {}", other))),
    }
}

/// Bind values for a raw fragment: a list binds each element, anything else binds itself.
fn binds(context: &str, value: &Json) -> Result<Vec<Value>, InvalidOption> {
    match value {
        Json::Array(items) => items.iter().map(|v| scalar(context, v)).collect(),
        other => Ok(vec![scalar(context, other)?]),
    }
}

pub fn parse_fields(value: &Json) -> Result<Vec<Field>, InvalidOption> {
    entries("fields", value)?
        .into_iter()
        .map(|entry| match entry {
            Entry::Unkeyed(expr) => Ok(Field::new(expr)),
            Entry::Keyed(alias, Json::String(expr)) => Ok(Field::aliased(alias, expr.as_str())),
            Entry::Keyed(alias, other) => Err(InvalidOption::new(format!(
                "field '{}' must map to an expression string, got {}",
                alias, other
            ))),
        })
        .collect()
}

pub fn parse_tables(value: &Json) -> Result<Vec<TableRef>, InvalidOption> {
    entries("tables", value)?
        .into_iter()
        .map(|entry| match entry {
            Entry::Unkeyed(expr) => Ok(TableRef::new(expr)),
            Entry::Keyed(expr, value) => Ok(TableRef::with_binds(
                expr,
                binds(&format!("table '{}'", expr), value)?,
            )),
        })
        .collect()
}

pub fn parse_conditions(value: &Json) -> Result<Vec<Condition>, InvalidOption> {
    entries("where", value)?
        .into_iter()
        .map(|entry| match entry {
            Entry::Unkeyed(expr) => Ok(Condition::raw(expr, Vec::new())),
            Entry::Keyed(expr, value) if has_markup(expr, WHERE_MARKUP) => {
                Ok(Condition::raw(expr, binds(&format!("where '{}'", expr), value)?))
            }
            Entry::Keyed(field, value) => {
                let context = format!("where '{}'", field);
                let field = whole_identifier(field).unwrap_or(field);
                match value {
                    Json::Array(items) if items.is_empty() => Err(InvalidOption::new(format!(
                        "{}: empty value list",
                        context
                    ))),
                    Json::Array(items) => {
                        let values = items
                            .iter()
                            .map(|v| scalar(&context, v))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Condition::any(field, values))
                    }
                    other => Ok(Condition::eq(field, scalar(&context, other)?)),
                }
            }
        })
        .collect()
}

pub fn parse_group(value: &Json) -> Result<Vec<Expr>, InvalidOption> {
    entries("group", value)?
        .into_iter()
        .map(|entry| match entry {
            Entry::Unkeyed(expr) => Ok(Expr::parse(expr)),
            Entry::Keyed(key, _) => Err(InvalidOption::new(format!(
                "group entry '{}' must not carry a value",
                key
            ))),
        })
        .collect()
}

pub fn parse_order(value: &Json) -> Result<Vec<OrderBy>, InvalidOption> {
    entries("order", value)?
        .into_iter()
        .map(|entry| {
            let (expr, direction) = match entry {
                Entry::Unkeyed(expr) => (expr, Direction::Asc),
                Entry::Keyed(expr, Json::String(dir)) if dir == "ASC" => (expr, Direction::Asc),
                Entry::Keyed(expr, Json::String(dir)) if dir == "DESC" => (expr, Direction::Desc),
                Entry::Keyed(expr, other) => {
                    return Err(InvalidOption::new(format!(
                        "order '{}' must be \"ASC\" or \"DESC\", got {}",
                        expr, other
                    )));
                }
            };
            Ok(OrderBy {
                expr: Expr::parse(expr),
                direction,
            })
        })
        .collect()
}

/// Parse an UPDATE change list. Keys containing `=` are raw assignments
/// bound to their value; other keys are columns set to their value.
pub fn parse_changes(value: &Json) -> Result<Vec<Assignment>, InvalidOption> {
    entries("changes", value)?
        .into_iter()
        .map(|entry| match entry {
            Entry::Unkeyed(expr) if expr.contains('=') => Ok(Assignment::raw(expr, Vec::new())),
            Entry::Unkeyed(field) => Err(InvalidOption::new(format!(
                "change '{}' has no value to assign",
                field
            ))),
            Entry::Keyed(expr, value) if expr.contains('=') => {
                Ok(Assignment::raw(expr, binds(&format!("change '{}'", expr), value)?))
            }
            Entry::Keyed(field, value) => Ok(Assignment::set(
                whole_identifier(field).unwrap_or(field),
                scalar(&format!("change '{}'", field), value)?,
            )),
        })
        .collect()
}

fn option<'a>(options: &'a Map<String, Json>, key: &str) -> &'a Json {
    static MISSING: Json = Json::Null;
    options.get(key).unwrap_or(&MISSING)
}

impl StructuredQuery {
    /// Parse and validate a SELECT descriptor.
    pub fn from_descriptor(descriptor: &Json) -> Result<Self, InvalidOption> {
        let supplied = descriptor.as_object().ok_or_else(|| {
            InvalidOption::new(format!("descriptor must be an object, got {}", descriptor))
        })?;
        let options = verify_and_process_options(&select_defaults(), supplied)?;
        let get = |key: &str| option(&options, key);

        Ok(StructuredQuery {
            fields: parse_fields(get("fields"))?,
            tables: parse_tables(get("tables"))?,
            conditions: parse_conditions(get("where"))?,
            group: parse_group(get("group"))?,
            order: parse_order(get("order"))?,
            limit: get("limit").as_u64().unwrap_or(0),
            offset: get("offset").as_u64().unwrap_or(0),
            lock: get("lock").as_bool().unwrap_or(false),
        })
    }
}

/// Whether `descriptor` describes an insert or update rather than a query.
pub fn is_write_descriptor(descriptor: &Json) -> bool {
    descriptor.get("changes").is_some() || descriptor.get("values").is_some()
}

impl Statement {
    /// Parse and validate a write descriptor: `changes` makes it an update,
    /// `values` an insert.
    pub fn from_descriptor(descriptor: &Json) -> Result<Self, InvalidOption> {
        let supplied = descriptor.as_object().ok_or_else(|| {
            InvalidOption::new(format!("descriptor must be an object, got {}", descriptor))
        })?;

        if supplied.contains_key("changes") {
            let options = verify_and_process_options(&update_defaults(), supplied)?;
            let get = |key: &str| option(&options, key);
            let changes = parse_changes(get("changes"))?;
            if changes.is_empty() {
                return Err(InvalidOption::new("no changes specified"));
            }
            return Ok(Statement::Update {
                table: required_table(get("table"))?,
                changes,
                conditions: parse_conditions(get("where"))?,
            });
        }

        if supplied.contains_key("values") {
            let options = verify_and_process_options(&insert_defaults(), supplied)?;
            let get = |key: &str| option(&options, key);
            let row = Row::from_json(get("values"))?;
            if row.is_empty() {
                return Err(InvalidOption::new("no values specified"));
            }
            let returning = match get("returning") {
                Json::Null => None,
                Json::String(column) if !column.trim().is_empty() => Some(column.clone()),
                other => {
                    return Err(InvalidOption::new(format!(
                        "'returning' must be a column name, got {}",
                        other
                    )));
                }
            };
            return Ok(Statement::Insert {
                table: required_table(get("table"))?,
                row,
                returning,
            });
        }

        Err(InvalidOption::new(
            "write descriptor needs 'changes' (update) or 'values' (insert)",
        ))
    }
}

impl Query {
    /// A raw query `{"sql": "...", "params": [...]}` or a SELECT descriptor.
    pub fn from_descriptor(descriptor: &Json) -> Result<Self, InvalidOption> {
        match descriptor.get("sql") {
            Some(Json::String(sql)) => {
                let params = match descriptor.get("params") {
                    None | Some(Json::Null) => Vec::new(),
                    Some(Json::Array(items)) => items
                        .iter()
                        .map(|v| scalar("params", v))
                        .collect::<Result<_, _>>()?,
                    Some(other) => {
                        return Err(InvalidOption::new(format!(
                            "'params' must be a list, got {}",
                            other
                        )));
                    }
                };
                if let Some(extra) = descriptor
                    .as_object()
                    .and_then(|map| map.keys().find(|k| *k != "sql" && *k != "params"))
                {
                    return Err(InvalidOption::new(format!("unknown option '{}'", extra)));
                }
                Ok(Query::raw(sql.as_str(), params))
            }
            Some(other) => Err(InvalidOption::new(format!("'sql' must be a string, got {}", other))),
            None => StructuredQuery::from_descriptor(descriptor).map(Query::Structured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use rstest::rstest;
    use serde_json::json;

    fn opts(value: Json) -> Map<String, Json> {
        value.as_object().cloned().unwrap()
    }

    #[rstest]
    fn test_unknown_option_rejected() {
        let err = verify_and_process_options(&select_defaults(), &opts(json!({"tables": "t", "colour": 1})))
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown option 'colour'");
    }

    #[rstest]
    fn test_tables_required() {
        let err = verify_and_process_options(&select_defaults(), &opts(json!({"fields": ["id"]}))).unwrap_err();
        assert_eq!(err.to_string(), "no tables specified");
        assert!(verify_and_process_options(&select_defaults(), &opts(json!({"tables": []}))).is_err());
    }

    #[rstest]
    #[case(json!(10), 10)]
    #[case(json!("20"), 20)]
    #[case(json!(null), 0)]
    fn test_limit_coercion(#[case] limit: Json, #[case] expected: u64) {
        let options = verify_and_process_options(&select_defaults(), &opts(json!({"tables": "t", "limit": limit})))
            .unwrap();
        assert_eq!(options["limit"], json!(expected));
    }

    #[rstest]
    #[case(json!(-1))]
    #[case(json!(1.5))]
    #[case(json!(true))]
    #[case(json!("ten"))]
    #[case(json!("-3"))]
    #[case(json!(""))]
    fn test_limit_rejections(#[case] offset: Json) {
        let result = verify_and_process_options(&select_defaults(), &opts(json!({"tables": "t", "offset": offset})));
        assert!(result.is_err());
    }

    #[rstest]
    #[case(json!(true), true)]
    #[case(json!(1), true)]
    #[case(json!(0), false)]
    fn test_lock_coercion(#[case] lock: Json, #[case] expected: bool) {
        let options = verify_and_process_options(&select_defaults(), &opts(json!({"tables": "t", "lock": lock})))
            .unwrap();
        assert_eq!(options["lock"], json!(expected));
    }

    #[rstest]
    fn test_lock_rejects_strings() {
        let result = verify_and_process_options(&select_defaults(), &opts(json!({"tables": "t", "lock": "yes"})));
        assert!(result.is_err());
    }

    #[rstest]
    fn test_singular_shortcuts() {
        let options =
            verify_and_process_options(&select_defaults(), &opts(json!({"table": "account", "field": "id"}))).unwrap();
        assert_eq!(options["tables"], json!("account"));
        assert_eq!(options["fields"], json!("id"));
        assert!(!options.contains_key("table"));

        let err = verify_and_process_options(&select_defaults(), &opts(json!({"table": "a", "tables": ["b"]})))
            .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[rstest]
    fn test_where_shapes() {
        let conditions = parse_conditions(&json!({
            "a.id": [1, 2, 3],
            "a.deleted": null,
            "a.kind": "admin",
            "a.owner": [5],
            ":a.created: > ?": "2020-01-01",
            ":a.score: BETWEEN ? AND ?": [1, 9]
        }))
        .unwrap();
        assert_eq!(
            conditions,
            vec![
                Condition::In {
                    field: "a.id".into(),
                    values: vec![1.into(), 2.into(), 3.into()]
                },
                Condition::is_null("a.deleted"),
                Condition::eq("a.kind", "admin"),
                Condition::eq("a.owner", 5),
                Condition::raw(":a.created: > ?", vec!["2020-01-01".into()]),
                Condition::raw(":a.score: BETWEEN ? AND ?", vec![1.into(), 9.into()]),
            ]
        );
    }

    #[rstest]
    fn test_unkeyed_where_is_raw() {
        let conditions = parse_conditions(&json!(["a.x IS NOT NULL", {"a.y": 1}])).unwrap();
        assert_eq!(conditions[0], Condition::raw("a.x IS NOT NULL", vec![]));
        assert_eq!(conditions[1], Condition::eq("a.y", 1));
    }

    #[rstest]
    fn test_where_key_with_identifier_span() {
        let conditions = parse_conditions(&json!({":a.id:": 7, ":a.kind:": ["x", "y"]})).unwrap();
        assert_eq!(conditions[0], Condition::eq("a.id", 7));
        assert_eq!(conditions[1], Condition::any("a.kind", vec!["x".into(), "y".into()]));

        let query = StructuredQuery::from_descriptor(&json!({"table": "account a", "where": {":a.id:": 7}})).unwrap();
        let compiled = query.compile(&Dialect::postgres()).unwrap();
        assert!(compiled.sql.contains(r#"WHERE "a"."id"=?"#), "{}", compiled.sql);
    }

    #[rstest]
    #[case(json!({"a.id": []}))]
    #[case(json!({"a.id": [[1]]}))]
    #[case(json!({"a.id": {"nested": 1}}))]
    #[case(json!([42]))]
    fn test_where_rejections(#[case] value: Json) {
        assert!(parse_conditions(&value).is_err());
    }

    #[rstest]
    fn test_order_directions() {
        let order = parse_order(&json!(["id", {"name": "DESC"}])).unwrap();
        assert_eq!(order[0].direction, Direction::Asc);
        assert_eq!(order[1].direction, Direction::Desc);
        assert!(parse_order(&json!({"name": "desc"})).is_err());
        assert!(parse_order(&json!({"name": 1})).is_err());
    }

    #[rstest]
    fn test_group_rejects_keyed_entries() {
        assert_eq!(parse_group(&json!(["a.id"])).unwrap(), vec![Expr::parse("a.id")]);
        assert!(parse_group(&json!({"a.id": "x"})).is_err());
    }

    #[rstest]
    fn test_fields() {
        let fields = parse_fields(&json!(["id", {"accountName": "a.name", "total": "SUM(:a.x:)"}])).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].alias.as_deref(), Some("accountName"));
        assert!(parse_fields(&json!({"n": 1})).is_err());
    }

    #[rstest]
    fn test_table_binds() {
        let tables = parse_tables(&json!(["account a", {"JOIN b ON (:b.k: = ? AND :b.j: = ?)": [1, "x"]}])).unwrap();
        assert_eq!(tables[1].binds, vec![Value::Int(1), Value::Str("x".into())]);
    }

    #[rstest]
    fn test_changes() {
        let changes = parse_changes(&json!({"name": "John", ":hits: = :hits: + ?": 1})).unwrap();
        assert_eq!(
            changes,
            vec![
                Assignment::set("name", "John"),
                Assignment::raw(":hits: = :hits: + ?", vec![1.into()]),
            ]
        );
        assert_eq!(
            parse_changes(&json!(["updated_at = CURRENT_TIMESTAMP"])).unwrap(),
            vec![Assignment::raw("updated_at = CURRENT_TIMESTAMP", vec![])]
        );
        let err = parse_changes(&json!(["name"])).unwrap_err();
        assert!(err.to_string().contains("no value"));
        assert!(parse_changes(&json!({"tags": ["a", "b"]})).is_err());
    }

    #[rstest]
    fn test_from_descriptor_compiles() {
        let query = StructuredQuery::from_descriptor(&json!({
            "fields": ["id", {"accountName": "a.name"}],
            "table": "account a",
            "where": {"a.id": [1, 2], "a.deleted": null},
            "order": {"a.name": "DESC"},
            "limit": "10",
            "offset": 20
        }))
        .unwrap();
        let compiled = query.compile(&Dialect::sqlite()).unwrap();
        assert_eq!(
            compiled.sql,
            r#"SELECT "id", "a"."name" AS "accountName" FROM "account" "a" WHERE "a"."id" IN (?,?) AND "a"."deleted" IS NULL ORDER BY "a"."name" DESC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(compiled.params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[rstest]
    fn test_query_from_raw_descriptor() {
        let query = Query::from_descriptor(&json!({"sql": "SELECT ?", "params": [1]})).unwrap();
        assert_eq!(query, Query::raw("SELECT ?", vec![Value::Int(1)]));
        assert!(Query::from_descriptor(&json!({"sql": "SELECT 1", "tables": "t"})).is_err());
        assert!(Query::from_descriptor(&json!({"sql": 5})).is_err());
    }

    #[rstest]
    fn test_update_descriptor() {
        let statement = Statement::from_descriptor(&json!({
            "table": "account",
            "changes": {"name": "John", ":hits: = :hits: + ?": 1},
            "where": {"id": [2, 3]}
        }))
        .unwrap();

        assert_eq!(statement.table(), "account");
        let compiled = statement.compile(&Dialect::postgres()).unwrap();
        assert_eq!(
            compiled.sql,
            r#"UPDATE "account" SET "name"=?,"hits" = "hits" + ? WHERE "id" IN (?,?)"#
        );
        assert_eq!(
            compiled.params,
            vec![Value::Str("John".into()), Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[rstest]
    fn test_insert_descriptor() {
        let statement = Statement::from_descriptor(&json!({
            "table": "account",
            "values": {"name": "John", "avatar": {"$lob": "0a0b"}},
            "returning": "id"
        }))
        .unwrap();

        match statement {
            Statement::Insert { table, row, returning } => {
                assert_eq!(table, "account");
                assert_eq!(row.columns(), &["name".to_string(), "avatar".to_string()]);
                assert_eq!(row.get("avatar"), Some(&Value::Blob(vec![10, 11])));
                assert_eq!(returning.as_deref(), Some("id"));
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[rstest]
    #[case(json!({"changes": {"name": "x"}}), "no table specified")]
    #[case(json!({"table": "a", "changes": {}}), "no changes specified")]
    #[case(json!({"table": "a", "changes": {"x": 1}, "limit": 1}), "unknown option 'limit'")]
    #[case(json!({"tables": "a", "changes": {"x": 1}}), "unknown option 'tables'")]
    #[case(json!({"table": "a", "values": {}}), "no values specified")]
    #[case(json!({"table": "a", "values": {"x": 1}, "where": {"id": 1}}), "unknown option 'where'")]
    #[case(json!({"table": "a", "values": {"x": 1}, "returning": 5}), "'returning' must be a column name")]
    #[case(json!({"table": 3, "values": {"x": 1}}), "'table' must be a table name")]
    #[case(json!({"table": "a"}), "needs 'changes' (update) or 'values' (insert)")]
    fn test_write_descriptor_rejections(#[case] descriptor: Json, #[case] message: &str) {
        let err = Statement::from_descriptor(&descriptor).unwrap_err();
        assert!(err.to_string().contains(message), "{}", err);
    }

    #[rstest]
    #[case(json!({"table": "a", "changes": {"x": 1}}), true)]
    #[case(json!({"table": "a", "values": {"x": 1}}), true)]
    #[case(json!({"tables": "a", "where": {"x": 1}}), false)]
    #[case(json!({"sql": "SELECT 1"}), false)]
    fn test_is_write_descriptor(#[case] descriptor: Json, #[case] expected: bool) {
        assert_eq!(is_write_descriptor(&descriptor), expected);
    }

    #[rstest]
    fn test_descriptor_must_be_object() {
        assert!(StructuredQuery::from_descriptor(&json!(["account"])).is_err());
    }
}
