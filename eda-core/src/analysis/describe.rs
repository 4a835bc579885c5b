//! Descriptive statistics over a registered table.

use std::sync::Arc;

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::prelude::*;

/// Name the table is registered under.
pub const DATASET_TABLE: &str = "dataset";

/// Summary of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Summary of a non-numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

/// One column of the describe table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub summary: ColumnSummary,
}

/// A DataFusion session with the table registered as [`DATASET_TABLE`].
pub struct StatsContext {
    ctx: SessionContext,
}

impl StatsContext {
    pub fn new(table: &Table) -> Result<Self> {
        let batch = table.to_record_batch()?;
        let provider = MemTable::try_new(batch.schema(), vec![vec![batch]])?;
        let ctx = SessionContext::new();
        ctx.register_table(DATASET_TABLE, Arc::new(provider))?;
        Ok(Self { ctx })
    }

    /// Runs `sql` and collects the result.
    pub async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        debug!(sql, "Running statistics query");
        Ok(self.ctx.sql(sql).await?.collect().await?)
    }

    /// Per-column describe, in table order: count, mean, std, min, quartiles
    /// and max for numeric columns; count, unique, top and freq otherwise.
    #[instrument(skip(self, table), fields(table = table.name()))]
    pub async fn describe(&self, table: &Table) -> Result<Vec<ColumnDescription>> {
        let mut descriptions = Vec::with_capacity(table.num_columns());
        for column in table.columns() {
            let summary = if column.kind().is_numeric() {
                ColumnSummary::Numeric(self.numeric_summary(column).await?)
            } else {
                ColumnSummary::Categorical(self.categorical_summary(column).await?)
            };
            descriptions.push(ColumnDescription {
                name: column.name().to_string(),
                summary,
            });
        }
        Ok(descriptions)
    }

    async fn numeric_summary(&self, column: &Column) -> Result<NumericSummary> {
        let c = quote_ident(column.name());
        let batches = self
            .query(&format!(
                "SELECT COUNT({c}) AS count, \
                 AVG(CAST({c} AS DOUBLE)) AS mean, \
                 STDDEV(CAST({c} AS DOUBLE)) AS std, \
                 MIN(CAST({c} AS DOUBLE)) AS min, \
                 MAX(CAST({c} AS DOUBLE)) AS max \
                 FROM {DATASET_TABLE}"
            ))
            .await?;

        let mut values = column.numeric_values();
        values.sort_by(f64::total_cmp);

        Ok(NumericSummary {
            count: first_i64(&batches, 0)?.unwrap_or(0) as usize,
            mean: first_f64(&batches, 1)?,
            std: first_f64(&batches, 2)?,
            min: first_f64(&batches, 3)?,
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: first_f64(&batches, 4)?,
        })
    }

    async fn categorical_summary(&self, column: &Column) -> Result<CategoricalSummary> {
        let c = quote_ident(column.name());
        let counts = self
            .query(&format!(
                "SELECT COUNT({c}) AS count, COUNT(DISTINCT {c}) AS uniq FROM {DATASET_TABLE}"
            ))
            .await?;
        let count = first_i64(&counts, 0)?.unwrap_or(0) as usize;
        let unique = first_i64(&counts, 1)?.unwrap_or(0) as usize;

        if count == 0 {
            return Ok(CategoricalSummary {
                count,
                unique,
                top: None,
                freq: None,
            });
        }

        let top = self
            .query(&format!(
                "SELECT CAST({c} AS VARCHAR) AS value, COUNT(*) AS freq \
                 FROM {DATASET_TABLE} WHERE {c} IS NOT NULL \
                 GROUP BY CAST({c} AS VARCHAR) \
                 ORDER BY freq DESC, value ASC LIMIT 1"
            ))
            .await?;

        Ok(CategoricalSummary {
            count,
            unique,
            top: first_string(&top, 0)?,
            freq: first_i64(&top, 1)?.map(|f| f as usize),
        })
    }
}

/// Quotes a column name for SQL, preserving case.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Linear-interpolated quantile of sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn first_cell(batches: &[RecordBatch], index: usize, to: &DataType) -> Result<Option<Arc<dyn Array>>> {
    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    if batch.column(index).is_null(0) {
        return Ok(None);
    }
    Ok(Some(cast(batch.column(index), to)?))
}

pub(crate) fn first_f64(batches: &[RecordBatch], index: usize) -> Result<Option<f64>> {
    Ok(first_cell(batches, index, &DataType::Float64)?
        .map(|a| a.as_primitive::<Float64Type>().value(0)))
}

pub(crate) fn first_i64(batches: &[RecordBatch], index: usize) -> Result<Option<i64>> {
    Ok(first_cell(batches, index, &DataType::Int64)?
        .map(|a| a.as_primitive::<Int64Type>().value(0)))
}

fn first_string(batches: &[RecordBatch], index: usize) -> Result<Option<String>> {
    Ok(first_cell(batches, index, &DataType::Utf8)?
        .map(|a| a.as_string::<i32>().value(0).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            "t",
            vec![
                Column::new(
                    "Amount",
                    DataKind::Float,
                    vec![
                        CellValue::Float(1.0),
                        CellValue::Float(2.0),
                        CellValue::Null,
                        CellValue::Float(4.0),
                    ],
                ),
                Column::new(
                    "city",
                    DataKind::Text,
                    ["b", "a", "b", "a"]
                        .iter()
                        .map(|s| CellValue::Text(s.to_string()))
                        .collect(),
                ),
                Column::new("empty", DataKind::Null, vec![CellValue::Null; 4]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&values, 0.75), Some(3.25));
        assert_eq!(quantile(&[7.0], 0.5), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Amount"), "\"Amount\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_describe_numeric_column() {
        let table = table();
        let stats = StatsContext::new(&table).unwrap();
        let described = stats.describe(&table).await.unwrap();

        let ColumnSummary::Numeric(summary) = &described[0].summary else {
            panic!("expected numeric summary");
        };
        assert_eq!(described[0].name, "Amount");
        assert_eq!(summary.count, 3);
        assert!((summary.mean.unwrap() - 7.0 / 3.0).abs() < 1e-9);
        assert!((summary.std.unwrap() - 1.527_525_231_651_947).abs() < 1e-9);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.median, Some(2.0));
        assert_eq!(summary.max, Some(4.0));
    }

    #[tokio::test]
    async fn test_describe_text_column_breaks_ties_by_value() {
        let table = table();
        let stats = StatsContext::new(&table).unwrap();
        let described = stats.describe(&table).await.unwrap();

        assert_eq!(
            described[1].summary,
            ColumnSummary::Categorical(CategoricalSummary {
                count: 4,
                unique: 2,
                top: Some("a".into()),
                freq: Some(2),
            })
        );
        assert_eq!(
            described[2].summary,
            ColumnSummary::Categorical(CategoricalSummary {
                count: 0,
                unique: 0,
                top: None,
                freq: None,
            })
        );
    }
}
