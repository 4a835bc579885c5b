//! The normalized in-memory table every reader produces.
//!
//! A [`Table`] is an ordered list of [`Column`]s of equal length. Each column
//! carries a single [`DataKind`]; cells are [`CellValue`]s. Row order is the
//! source's row order. Tables are built once by a reader and only read after.

mod arrow_bridge;

pub use self::arrow_bridge::kind_for_arrow_type;

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Scalar type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
    /// No non-null cell was seen.
    Null,
}

impl DataKind {
    /// Lower-case name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Integer => "integer",
            DataKind::Float => "float",
            DataKind::Boolean => "boolean",
            DataKind::Timestamp => "timestamp",
            DataKind::Text => "text",
            DataKind::Null => "null",
        }
    }

    /// Integer and float columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataKind::Integer | DataKind::Float)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl CellValue {
    /// The kind this value would give a column on its own.
    pub fn kind(&self) -> DataKind {
        match self {
            CellValue::Null => DataKind::Null,
            CellValue::Integer(_) => DataKind::Integer,
            CellValue::Float(_) => DataKind::Float,
            CellValue::Boolean(_) => DataKind::Boolean,
            CellValue::Timestamp(_) => DataKind::Timestamp,
            CellValue::Text(_) => DataKind::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Float(v) => f.write_str(&format_float(*v)),
            CellValue::Boolean(v) => write!(f, "{v}"),
            CellValue::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Renders a float so integral values keep a trailing `.0`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Renders midnight timestamps as plain dates.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.time().num_seconds_from_midnight() == 0 && ts.time().nanosecond() == 0 {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: DataKind,
    values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: DataKind, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Non-null numeric values in row order; empty for non-numeric columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        if !self.kind.is_numeric() {
            return Vec::new();
        }
        self.values.iter().filter_map(CellValue::as_f64).collect()
    }
}

/// The normalized tabular result of any reader.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Builds a table, enforcing that all columns have the same length.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != num_rows) {
            return Err(EdaError::Internal(format!(
                "column '{}' has {} rows, expected {num_rows}",
                bad.name(),
                bad.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            columns,
            num_rows,
        })
    }

    /// A table with no columns and no rows.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            num_rows: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.columns.len())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Integer and float columns, in table order.
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.kind().is_numeric()).collect()
    }

    /// Text columns, in table order.
    pub fn text_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.kind() == DataKind::Text)
            .collect()
    }
}
