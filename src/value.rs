//! Bindable values and result rows.
//!
//! [`Value`] is the only type that can be bound into a query. It has no
//! composite variant: lists exist only inside the query AST (e.g. `IN`
//! conditions), so a bound parameter is always scalar, NULL or a large object.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::InvalidOption;

/// Key of the JSON object that marks a large object (`{"$lob": "<hex>"}`).
pub const LOB_MARKER: &str = "$lob";

/// A scalar query parameter or result cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Large object, bound as a binary parameter.
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integers as-is, floats truncated, integer-like strings parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// SQLite and MySQL hand booleans back as 0/1 integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Text form used for generated keys (`last_insert_id`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Blob(_) => None,
            Value::Bool(b) => Some(i64::from(*b).to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
        }
    }

    /// Convert a JSON descriptor value into a bindable scalar.
    ///
    /// Arrays and objects are rejected, except the large-object marker
    /// `{"$lob": "<hex>"}`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvalidOption> {
        use serde_json::Value as Json;

        match value {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(InvalidOption::new(format!("number out of range: {}", n)))
                }
            }
            Json::String(s) => Ok(Value::Str(s.clone())),
            Json::Object(map) if map.len() == 1 && map.contains_key(LOB_MARKER) => {
                match &map[LOB_MARKER] {
                    Json::String(encoded) => hex::decode(encoded).map(Value::Blob).map_err(|e| {
                        InvalidOption::new(format!("large object is not valid hex: {}", e))
                    }),
                    other => Err(InvalidOption::new(format!(
                        "large object must be a hex string, got {}",
                        other
                    ))),
                }
            }
            Json::Array(_) | Json::Object(_) => Err(InvalidOption::new(format!(
                "only scalar values can be bound, got {}",
                value
            ))),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Blob(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(LOB_MARKER, &hex::encode(bytes))?;
                map.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered column → value record.
///
/// Used both for result rows and for the rows handed to `insert` and
/// `insert_or_update`. Column order is insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from parallel column and value lists.
    ///
    /// # Panics
    /// Panics if the lists differ in length; drivers always produce them in lockstep.
    pub fn from_parts(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(columns.len(), values.len(), "column/value count mismatch");
        Self { columns, values }
    }

    /// Builder-style setter; replaces the value if the column already exists.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a JSON object into a row, keeping document order.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvalidOption> {
        let map = value
            .as_object()
            .ok_or_else(|| InvalidOption::new(format!("row must be an object, got {}", value)))?;
        let mut row = Row::new();
        for (column, cell) in map {
            let cell = Value::from_json(cell)
                .map_err(|e| InvalidOption::new(format!("column '{}': {}", column, e)))?;
            row.set(column.as_str(), cell);
        }
        Ok(row)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
