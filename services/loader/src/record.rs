//! Flat, typed attribute records ready for upsert.

use chrono::NaiveDateTime;
use std::fmt;

/// A column value. Nulls keep their column type so they can be bound to a
/// typed statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
    Timestamp(Option<NaiveDateTime>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Int(v) => v.is_none(),
            SqlValue::Float(v) => v.is_none(),
            SqlValue::Bool(v) => v.is_none(),
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Timestamp(v) => v.is_none(),
        }
    }

    /// Same type, no value.
    pub fn to_null(&self) -> SqlValue {
        match self {
            SqlValue::Int(_) => SqlValue::Int(None),
            SqlValue::Float(_) => SqlValue::Float(None),
            SqlValue::Bool(_) => SqlValue::Bool(None),
            SqlValue::Text(_) => SqlValue::Text(None),
            SqlValue::Timestamp(_) => SqlValue::Timestamp(None),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(Some(v)) => write!(f, "{v}"),
            SqlValue::Float(Some(v)) => write!(f, "{v}"),
            SqlValue::Bool(Some(v)) => write!(f, "{v}"),
            SqlValue::Text(Some(v)) => write!(f, "{v:?}"),
            SqlValue::Timestamp(Some(v)) => write!(f, "{v}"),
            _ => f.write_str("NULL"),
        }
    }
}

/// Column/value pairs in table column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(&'static str, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: SqlValue) -> Self {
        self.set(column, value);
        self
    }

    pub fn int(self, column: &'static str, value: Option<i64>) -> Self {
        self.with(column, SqlValue::Int(value))
    }

    pub fn float(self, column: &'static str, value: Option<f64>) -> Self {
        self.with(column, SqlValue::Float(value))
    }

    pub fn boolean(self, column: &'static str, value: Option<bool>) -> Self {
        self.with(column, SqlValue::Bool(value))
    }

    pub fn text(self, column: &'static str, value: Option<String>) -> Self {
        self.with(column, SqlValue::Text(value))
    }

    pub fn timestamp(self, column: &'static str, value: Option<NaiveDateTime>) -> Self {
        self.with(column, SqlValue::Timestamp(value))
    }

    /// Replace an existing column's value, or append a new column.
    pub fn set(&mut self, column: &'static str, value: SqlValue) {
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Turn a column into a typed null, keeping its position.
    pub fn clear(&mut self, column: &str) {
        if let Some((_, slot)) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            *slot = slot.to_null();
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(c, _)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SqlValue)> {
        self.fields.iter().map(|(c, v)| (*c, v))
    }
}
