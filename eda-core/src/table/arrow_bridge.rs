//! Conversions between [`Table`] and Arrow record batches.
//!
//! File readers load through DataFusion and land here; the statistics stage
//! goes the other way to register a table with a `SessionContext`.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, RecordBatch,
    RecordBatchOptions, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, SchemaRef, TimeUnit,
    TimestampMicrosecondType,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use chrono::DateTime;

use super::{CellValue, Column, DataKind, Table};
use crate::prelude::*;

/// Maps an Arrow type to the column kind it produces.
pub fn kind_for_arrow_type(data_type: &DataType) -> DataKind {
    match data_type {
        DataType::Null => DataKind::Null,
        DataType::Boolean => DataKind::Boolean,
        DataType::Decimal128(..) | DataType::Decimal256(..) => DataKind::Float,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(..) => DataKind::Timestamp,
        dt if dt.is_integer() => DataKind::Integer,
        dt if dt.is_floating() => DataKind::Float,
        _ => DataKind::Text,
    }
}

impl Table {
    /// Builds a table from the batches of a DataFusion query.
    ///
    /// The schema is passed separately so a source with headers but no rows
    /// still yields its columns.
    pub fn from_record_batches(
        name: impl Into<String>,
        schema: &SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let num_rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let mut columns = Vec::with_capacity(schema.fields().len());

        for (index, field) in schema.fields().iter().enumerate() {
            let kind = kind_for_arrow_type(field.data_type());
            let mut values = Vec::with_capacity(num_rows);
            for batch in batches {
                append_cells(batch.column(index), kind, &mut values)?;
            }
            columns.push(Column::new(field.name().clone(), kind, values));
        }

        Table::new(name, columns)
    }

    /// Converts the table into a single record batch.
    ///
    /// Integer → Int64, Float → Float64, Boolean → Boolean, Timestamp →
    /// Timestamp(µs), Text and Null → Utf8.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.num_columns());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.num_columns());

        for column in self.columns() {
            let (data_type, array) = column_to_array(column);
            fields.push(Field::new(column.name(), data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }
}

fn append_cells(array: &ArrayRef, kind: DataKind, out: &mut Vec<CellValue>) -> Result<()> {
    match kind {
        DataKind::Null => out.extend(std::iter::repeat_n(CellValue::Null, array.len())),
        DataKind::Integer => {
            let casted = cast(array, &DataType::Int64)?;
            let ints = casted.as_primitive::<Int64Type>();
            out.extend((0..ints.len()).map(|i| {
                if ints.is_null(i) {
                    CellValue::Null
                } else {
                    CellValue::Integer(ints.value(i))
                }
            }));
        }
        DataKind::Float => {
            let casted = cast(array, &DataType::Float64)?;
            let floats = casted.as_primitive::<Float64Type>();
            out.extend((0..floats.len()).map(|i| {
                let value = floats.value(i);
                if floats.is_null(i) || value.is_nan() {
                    CellValue::Null
                } else {
                    CellValue::Float(value)
                }
            }));
        }
        DataKind::Boolean => {
            let bools = array.as_boolean();
            out.extend((0..bools.len()).map(|i| {
                if bools.is_null(i) {
                    CellValue::Null
                } else {
                    CellValue::Boolean(bools.value(i))
                }
            }));
        }
        DataKind::Timestamp => {
            let casted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
            let micros = casted.as_primitive::<TimestampMicrosecondType>();
            out.extend((0..micros.len()).map(|i| {
                if micros.is_null(i) {
                    return CellValue::Null;
                }
                DateTime::from_timestamp_micros(micros.value(i))
                    .map(|dt| CellValue::Timestamp(dt.naive_utc()))
                    .unwrap_or(CellValue::Null)
            }));
        }
        DataKind::Text => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            for i in 0..array.len() {
                if array.is_null(i) {
                    out.push(CellValue::Null);
                } else {
                    out.push(CellValue::Text(formatter.value(i).to_string()));
                }
            }
        }
    }
    Ok(())
}

fn column_to_array(column: &Column) -> (DataType, ArrayRef) {
    let values = column.values();
    match column.kind() {
        DataKind::Integer => {
            let array: Int64Array = values
                .iter()
                .map(|v| match v {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(array))
        }
        DataKind::Float => {
            let array: Float64Array = values.iter().map(CellValue::as_f64).collect();
            (DataType::Float64, Arc::new(array))
        }
        DataKind::Boolean => {
            let array: BooleanArray = values
                .iter()
                .map(|v| match v {
                    CellValue::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(array))
        }
        DataKind::Timestamp => {
            let array: TimestampMicrosecondArray = values
                .iter()
                .map(|v| match v {
                    CellValue::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect();
            (DataType::Timestamp(TimeUnit::Microsecond, None), Arc::new(array))
        }
        DataKind::Text | DataKind::Null => {
            let array: StringArray = values
                .iter()
                .map(|v| match v {
                    CellValue::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            (DataType::Utf8, Arc::new(array))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int32Array, StringViewArray, UInt8Array};

    #[test]
    fn test_kind_mapping() {
        assert_eq!(kind_for_arrow_type(&DataType::Int32), DataKind::Integer);
        assert_eq!(kind_for_arrow_type(&DataType::UInt64), DataKind::Integer);
        assert_eq!(kind_for_arrow_type(&DataType::Float32), DataKind::Float);
        assert_eq!(kind_for_arrow_type(&DataType::Decimal128(10, 2)), DataKind::Float);
        assert_eq!(kind_for_arrow_type(&DataType::Boolean), DataKind::Boolean);
        assert_eq!(kind_for_arrow_type(&DataType::Date32), DataKind::Timestamp);
        assert_eq!(kind_for_arrow_type(&DataType::Utf8View), DataKind::Text);
        assert_eq!(kind_for_arrow_type(&DataType::Null), DataKind::Null);
    }

    #[test]
    fn test_from_record_batches() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8View, true),
            Field::new("day", DataType::Date32, true),
            Field::new("flag", DataType::UInt8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![Some(1), None])),
                Arc::new(StringViewArray::from(vec![Some("a"), Some("b")])),
                Arc::new(Date32Array::from(vec![Some(19_727), None])),
                Arc::new(UInt8Array::from(vec![Some(1), Some(0)])),
            ],
        )
        .unwrap();

        let table = Table::from_record_batches("t", &schema, &[batch]).unwrap();
        assert_eq!(table.shape(), (2, 4));
        assert_eq!(table.columns()[0].values()[0], CellValue::Integer(1));
        assert_eq!(table.columns()[0].values()[1], CellValue::Null);
        assert_eq!(table.columns()[1].values()[1], CellValue::Text("b".into()));
        assert_eq!(table.columns()[2].kind(), DataKind::Timestamp);
        assert_eq!(table.columns()[2].values()[0].to_string(), "2024-01-05");
        assert_eq!(table.columns()[3].kind(), DataKind::Integer);
    }

    #[test]
    fn test_schema_without_batches_keeps_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("A", DataType::Utf8, true),
            Field::new("B", DataType::Utf8, true),
        ]));
        let table = Table::from_record_batches("t", &schema, &[]).unwrap();
        assert_eq!(table.shape(), (0, 2));
        assert_eq!(table.column_names(), vec!["A", "B"]);
    }

    #[test]
    fn test_to_record_batch() {
        let table = Table::new(
            "t",
            vec![
                Column::new(
                    "n",
                    DataKind::Float,
                    vec![CellValue::Float(1.5), CellValue::Null],
                ),
                Column::new(
                    "s",
                    DataKind::Text,
                    vec![CellValue::Text("x".into()), CellValue::Text("y".into())],
                ),
                Column::new("empty", DataKind::Null, vec![CellValue::Null, CellValue::Null]),
            ],
        )
        .unwrap();

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Float64);
        assert_eq!(batch.schema().field(2).data_type(), &DataType::Utf8);
        assert_eq!(batch.column(0).null_count(), 1);
        assert_eq!(batch.column(2).null_count(), 2);
    }

    #[test]
    fn test_to_record_batch_without_columns() {
        let batch = Table::empty("t").to_record_batch().unwrap();
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 0);
    }
}
