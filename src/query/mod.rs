//! Structured queries and their compilation to parameterized SQL.
//!
//! # Architecture
//!
//! 1. **Representation** - [`StructuredQuery`] is a typed AST (fields, tables,
//!    conditions, grouping, ordering, paging, locking). It is built either with
//!    [`StructuredQuery::builder`] or parsed from a JSON descriptor by
//!    [`StructuredQuery::from_descriptor`].
//! 2. **Compilation** - the functions in [`compile`] turn the AST into SQL text
//!    plus positional parameters for a given [`Dialect`]. No I/O happens here.
//! 3. **Execution** - a [`CompiledQuery`] is handed to a driver by the
//!    connection layer.
//!
//! # Example
//!
//! ```
//! use dbal::dialect::Dialect;
//! use dbal::query::{Condition, StructuredQuery};
//!
//! let query = StructuredQuery::builder()
//!     .field_as("accountName", "a.name")
//!     .table("account a")
//!     .filter(Condition::any("a.id", vec![1.into(), 2.into()]))
//!     .limit(10)
//!     .build()
//!     .unwrap();
//!
//! let compiled = query.compile(&Dialect::postgres()).unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     r#"SELECT "a"."name" AS "accountName" FROM "account" "a" WHERE "a"."id" IN (?,?) LIMIT 10"#
//! );
//! assert_eq!(compiled.params.len(), 2);
//! ```

pub mod compile;
pub mod descriptor;
pub mod expr;

use crate::dialect::Dialect;
use crate::error::InvalidOption;
use crate::value::{Row, Value};

pub use expr::Expr;

/// One entry of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    /// Output name, only set when it differs from the expression text.
    pub alias: Option<String>,
}

impl Field {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: Expr::parse(expr),
            alias: None,
        }
    }

    pub fn aliased(alias: impl Into<String>, expr: impl Into<String>) -> Self {
        let alias = alias.into();
        let expr = expr.into();
        let alias = (alias != expr).then_some(alias);
        Self {
            expr: Expr::parse(expr),
            alias,
        }
    }
}

/// One entry of the FROM list, with values for any `?` it embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub expr: String,
    pub binds: Vec<Value>,
}

impl TableRef {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            binds: Vec::new(),
        }
    }

    pub fn with_binds(expr: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            expr: expr.into(),
            binds,
        }
    }
}

/// A WHERE predicate. Predicates are always combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    IsNull { field: String },
    /// Boolean SQL fragment, wrapped in parentheses when compiled.
    Raw { expr: String, binds: Vec<Value> },
}

impl Condition {
    /// `field = value`, or `field IS NULL` for a NULL value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        match value.into() {
            Value::Null => Condition::IsNull { field },
            value => Condition::Eq { field, value },
        }
    }

    /// Membership test. A single value degrades to [`Condition::eq`]; an
    /// empty list is rejected at compile time.
    pub fn any(field: impl Into<String>, mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            let value = values.pop().unwrap_or_default();
            return Condition::eq(field, value);
        }
        Condition::In {
            field: field.into(),
            values,
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::IsNull {
            field: field.into(),
        }
    }

    pub fn raw(expr: impl Into<String>, binds: Vec<Value>) -> Self {
        Condition::Raw {
            expr: expr.into(),
            binds,
        }
    }
}

/// One entry of an UPDATE SET list (also used for upsert updates).
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set { field: String, value: Value },
    /// Assignment fragment such as `:hits: = :hits: + ?`; must contain `=`.
    Raw { expr: String, binds: Vec<Value> },
}

impl Assignment {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Assignment::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn raw(expr: impl Into<String>, binds: Vec<Value>) -> Self {
        Assignment::Raw {
            expr: expr.into(),
            binds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: Direction,
}

/// A SELECT in structured form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredQuery {
    pub fields: Vec<Field>,
    pub tables: Vec<TableRef>,
    pub conditions: Vec<Condition>,
    pub group: Vec<Expr>,
    pub order: Vec<OrderBy>,
    /// `0` means no limit.
    pub limit: u64,
    /// `0` means no offset.
    pub offset: u64,
    pub lock: bool,
}

impl StructuredQuery {
    pub fn builder() -> StructuredQueryBuilder {
        StructuredQueryBuilder::default()
    }

    pub fn compile(&self, dialect: &Dialect) -> Result<CompiledQuery, InvalidOption> {
        compile::compile_select(dialect, self)
    }
}

/// Typed construction of a [`StructuredQuery`].
#[derive(Debug, Default)]
pub struct StructuredQueryBuilder {
    query: StructuredQuery,
}

impl StructuredQueryBuilder {
    pub fn field(mut self, expr: impl Into<String>) -> Self {
        self.query.fields.push(Field::new(expr));
        self
    }

    pub fn field_as(mut self, alias: impl Into<String>, expr: impl Into<String>) -> Self {
        self.query.fields.push(Field::aliased(alias, expr));
        self
    }

    pub fn table(mut self, expr: impl Into<String>) -> Self {
        self.query.tables.push(TableRef::new(expr));
        self
    }

    pub fn table_with(mut self, expr: impl Into<String>, binds: Vec<Value>) -> Self {
        self.query.tables.push(TableRef::with_binds(expr, binds));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.query.conditions.push(condition);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Condition::eq(field, value))
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.query.group.push(Expr::parse(expr));
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>, direction: Direction) -> Self {
        self.query.order.push(OrderBy {
            expr: Expr::parse(expr),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset = offset;
        self
    }

    pub fn lock(mut self, lock: bool) -> Self {
        self.query.lock = lock;
        self
    }

    pub fn build(self) -> Result<StructuredQuery, InvalidOption> {
        if self.query.tables.is_empty() {
            return Err(InvalidOption::new("no tables specified"));
        }
        Ok(self.query)
    }
}

/// Input accepted by `select` and the fetch helpers.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Literal SQL with positional `?` parameters.
    Raw { sql: String, params: Vec<Value> },
    Structured(StructuredQuery),
}

impl Query {
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Query::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn compile(&self, dialect: &Dialect) -> Result<CompiledQuery, InvalidOption> {
        match self {
            Query::Raw { sql, params } => Ok(CompiledQuery {
                sql: sql.clone(),
                params: params.clone(),
            }),
            Query::Structured(query) => query.compile(dialect),
        }
    }
}

impl From<StructuredQuery> for Query {
    fn from(query: StructuredQuery) -> Self {
        Query::Structured(query)
    }
}

/// A single-table write, as described by an insert or update descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: String,
        row: Row,
        /// Generated column whose new value is reported back.
        returning: Option<String>,
    },
    Update {
        table: String,
        changes: Vec<Assignment>,
        conditions: Vec<Condition>,
    },
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. } | Statement::Update { table, .. } => table,
        }
    }

    pub fn compile(&self, dialect: &Dialect) -> Result<CompiledQuery, InvalidOption> {
        match self {
            Statement::Insert { table, row, returning } => {
                compile::compile_insert(dialect, table, row, returning.as_deref())
            }
            Statement::Update {
                table,
                changes,
                conditions,
            } => compile::compile_update(dialect, table, changes, conditions),
        }
    }
}

/// SQL text ready for a driver, with parameters in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}
