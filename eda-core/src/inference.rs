//! Cell-level type inference for sources that deliver every cell as text.
//!
//! [`TypeInferrer::infer`] tries, in order: empty → null, integer, float,
//! timestamp, and finally keeps the text. The order goes from the narrowest
//! parse to the widest so `"1.0"` stays a float and `"2024-01-05"` is never
//! read as a number.
//!
//! Once every cell of a column has been inferred, [`reconcile`] settles the
//! column on a single [`DataKind`]. Nulls carry no signal.
//!
//! # Example
//!
//! ```rust
//! use eda_core::inference::{reconcile, Reconciliation, TypeInferrer};
//! use eda_core::table::DataKind;
//!
//! let inferrer = TypeInferrer::new();
//! let cells: Vec<_> = ["1", "x", "3"].iter().map(|c| inferrer.infer_cell(c)).collect();
//! let column = reconcile("A", cells, Reconciliation::Strict);
//!
//! assert_eq!(column.kind(), DataKind::Text);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::table::{CellValue, Column, DataKind};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Converts textual cells into typed scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeInferrer;

impl TypeInferrer {
    pub fn new() -> Self {
        Self
    }

    /// Infers the scalar value of one cell.
    pub fn infer(&self, text: &str) -> CellValue {
        if text.is_empty() {
            return CellValue::Null;
        }

        let trimmed = text.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return CellValue::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            // NaN is treated as a missing value downstream
            return if value.is_nan() {
                CellValue::Null
            } else {
                CellValue::Float(value)
            };
        }
        if let Some(ts) = parse_timestamp(trimmed) {
            return CellValue::Timestamp(ts);
        }

        CellValue::Text(text.to_string())
    }

    /// Infers a cell and keeps its source text for later re-rendering.
    pub fn infer_cell(&self, text: &str) -> InferredCell {
        InferredCell {
            value: self.infer(text),
            raw: text.to_string(),
        }
    }
}

/// Parses the fixed calendar grammar: RFC 3339, ISO date-times with a `T` or
/// space separator, and `YYYY-MM-DD` / `YYYY/MM/DD` dates.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// A cell's inferred value together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredCell {
    pub value: CellValue,
    pub raw: String,
}

impl InferredCell {
    /// A cell that is already typed, rendered from its own value.
    pub fn typed(value: CellValue) -> Self {
        let raw = value.to_string();
        Self { value, raw }
    }
}

/// How a column with disagreeing cell kinds is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Any disagreement demotes the column to text.
    Strict,
    /// Integer and float cells widen to float; other disagreements demote to text.
    NumericWidening,
}

/// Settles a column of independently inferred cells on one kind.
///
/// When the column is demoted to text, every non-null cell is re-rendered
/// from its raw text, so `"1"` in a mixed column becomes the text `"1"`.
pub fn reconcile(name: impl Into<String>, cells: Vec<InferredCell>, mode: Reconciliation) -> Column {
    let kind = reconciled_kind(cells.iter().map(|c| c.value.kind()), mode);

    let values = cells
        .into_iter()
        .map(|cell| match (kind, cell.value) {
            (_, CellValue::Null) => CellValue::Null,
            (DataKind::Text, CellValue::Text(s)) => CellValue::Text(s),
            (DataKind::Text, _) => CellValue::Text(cell.raw),
            (DataKind::Float, CellValue::Integer(i)) => CellValue::Float(i as f64),
            (_, value) => value,
        })
        .collect();

    Column::new(name, kind, values)
}

/// The column kind produced by a sequence of cell kinds.
pub fn reconciled_kind(kinds: impl IntoIterator<Item = DataKind>, mode: Reconciliation) -> DataKind {
    let mut settled: Option<DataKind> = None;

    for kind in kinds.into_iter().filter(|k| *k != DataKind::Null) {
        settled = Some(match settled {
            None => kind,
            Some(current) if current == kind => current,
            Some(current)
                if mode == Reconciliation::NumericWidening
                    && current.is_numeric()
                    && kind.is_numeric() =>
            {
                DataKind::Float
            }
            Some(_) => return DataKind::Text,
        });
    }

    settled.unwrap_or(DataKind::Null)
}
