//! Prompt-kind detection from the shape of a table.

use crate::narrative::PromptKind;
use crate::prelude::*;

/// Column names that mark a table as a time series.
const TIME_COLUMN_NAMES: &[&str] = &["date", "timestamp"];

/// Picks the prompt variant for `table`.
///
/// A column named exactly `date` or `timestamp` means timeseries, whatever
/// its kind. Otherwise numeric (integer or float) columns are weighed
/// against text columns: more than twice as many numeric columns means
/// numeric, more than twice as many text columns means categorical.
pub fn detect_data_type(table: &Table) -> PromptKind {
    if table
        .column_names()
        .iter()
        .any(|name| TIME_COLUMN_NAMES.contains(name))
    {
        return PromptKind::Timeseries;
    }

    let numeric = table.numeric_columns().len();
    let text = table.text_columns().len();
    if numeric > text * 2 {
        PromptKind::Numeric
    } else if text > numeric * 2 {
        PromptKind::Categorical
    } else {
        PromptKind::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, kind: DataKind) -> Column {
        let value = match kind {
            DataKind::Integer => CellValue::Integer(1),
            DataKind::Float => CellValue::Float(1.5),
            DataKind::Boolean => CellValue::Boolean(true),
            DataKind::Text => CellValue::Text("x".into()),
            _ => CellValue::Null,
        };
        Column::new(name, kind, vec![value])
    }

    fn table(columns: &[(&str, DataKind)]) -> Table {
        Table::new(
            "t",
            columns.iter().map(|(n, k)| column(n, *k)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_table() {
        let t = table(&[("A", DataKind::Integer), ("B", DataKind::Float)]);
        assert_eq!(detect_data_type(&t), PromptKind::Numeric);
    }

    #[test]
    fn test_categorical_table() {
        let t = table(&[("A", DataKind::Text), ("B", DataKind::Text)]);
        assert_eq!(detect_data_type(&t), PromptKind::Categorical);
    }

    #[test]
    fn test_date_name_wins_even_for_text() {
        let t = table(&[("date", DataKind::Text), ("value", DataKind::Integer)]);
        assert_eq!(detect_data_type(&t), PromptKind::Timeseries);

        let t = table(&[("timestamp", DataKind::Timestamp)]);
        assert_eq!(detect_data_type(&t), PromptKind::Timeseries);

        let t = table(&[("Date", DataKind::Text), ("v", DataKind::Text)]);
        assert_eq!(detect_data_type(&t), PromptKind::Categorical);
    }

    #[test]
    fn test_balanced_table_is_default() {
        let t = table(&[("A", DataKind::Integer), ("B", DataKind::Text)]);
        assert_eq!(detect_data_type(&t), PromptKind::Default);
        assert_eq!(detect_data_type(&Table::empty("e")), PromptKind::Default);
    }

    #[test]
    fn test_boolean_and_null_columns_count_for_neither_side() {
        let t = table(&[
            ("A", DataKind::Integer),
            ("flag", DataKind::Boolean),
            ("gone", DataKind::Null),
        ]);
        assert_eq!(detect_data_type(&t), PromptKind::Numeric);
    }
}
