//! Feature values, row keys, schemas and frames
//!
//! A fetched row is a loose name → value map ([`RawRow`]). The normalizer turns a
//! batch of those into a [`FeatureFrame`]: fixed column order, typed per
//! [`FeatureSchema`], ready for a scorer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar from the store or a default rule
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Missing,
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        FeatureValue::Text(v)
    }
}

/// One fetched row, keyed by result column alias
pub type RawRow = BTreeMap<String, FeatureValue>;

/// Primary key of a target row
///
/// Serializes as a bare JSON number or string so responses echo the id in its own type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RowKey {
    Integer(i64),
    Text(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Integer(v) => write!(f, "{}", v),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}

/// Store type of a target table's primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Text,
}

impl KeyKind {
    /// Parse an externally supplied id (e.g. a URL segment)
    pub fn parse(&self, raw: &str) -> Option<RowKey> {
        match self {
            KeyKind::Integer => raw.trim().parse().ok().map(RowKey::Integer),
            KeyKind::Text if raw.is_empty() => None,
            KeyKind::Text => Some(RowKey::Text(raw.to_string())),
        }
    }

    /// Declared SQL type used for schema verification
    pub fn sql_type(&self) -> &'static str {
        match self {
            KeyKind::Integer => "INTEGER",
            KeyKind::Text => "TEXT",
        }
    }
}

/// Numeric columns feed the model as numbers, categorical ones as labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureColumn {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FeatureKind::Numeric,
        }
    }

    pub fn categorical(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FeatureKind::Categorical,
        }
    }
}

/// Ordered feature columns a scorer was trained on
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<FeatureColumn>);

impl FeatureSchema {
    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self(columns)
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    /// Describe the first disagreement with `other`, if any
    pub fn first_difference(&self, other: &FeatureSchema) -> Option<String> {
        for (i, (ours, theirs)) in self.0.iter().zip(other.0.iter()).enumerate() {
            if ours != theirs {
                return Some(format!(
                    "column {}: expected {} ({:?}), found {} ({:?})",
                    i, ours.name, ours.kind, theirs.name, theirs.kind
                ));
            }
        }
        if self.len() != other.len() {
            return Some(format!(
                "expected {} columns, found {}",
                self.len(),
                other.len()
            ));
        }
        None
    }
}

/// Model-ready rows; every row has one value per schema column, kinds checked
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    schema: FeatureSchema,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureFrame {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`
    pub fn value(&self, row: usize, column: &str) -> Option<&FeatureValue> {
        let col = self.schema.position(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Append a row, rejecting wrong width or a value of the wrong kind
    pub fn push_row(&mut self, values: Vec<FeatureValue>) -> Result<()> {
        if values.len() != self.schema.len() {
            return Err(Error::Feature(format!(
                "row has {} values, schema has {} columns",
                values.len(),
                self.schema.len()
            )));
        }

        for (column, value) in self.schema.columns().iter().zip(&values) {
            let ok = match (column.kind, value) {
                (_, FeatureValue::Missing) => true,
                (FeatureKind::Numeric, FeatureValue::Number(v)) => v.is_finite(),
                (FeatureKind::Categorical, FeatureValue::Text(_)) => true,
                _ => false,
            };
            if !ok {
                return Err(Error::Feature(format!(
                    "column {} expects a {:?} value, got {:?}",
                    column.name, column.kind, value
                )));
            }
        }

        self.rows.push(values);
        Ok(())
    }
}
