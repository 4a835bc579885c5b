//! Data source readers.
//!
//! Every reader turns one kind of source into a [`Table`]. The
//! [`ReaderFactory`] inspects a source identifier and returns the matching
//! [`Reader`] variant; no I/O happens until [`DataReader::read_data`] is
//! called.

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use datafusion::dataframe::DataFrame;
use serde::Serialize;
use tracing::debug;

use crate::prelude::*;

mod csv;
mod factory;
mod json;
mod parquet;
mod sheets;
mod xlsx;

pub use self::csv::DelimitedReader;
pub use self::factory::{ReaderFactory, SHEETS_SCHEME};
pub use self::json::JsonLinesReader;
pub use self::parquet::ParquetReader;
pub use self::sheets::SheetsReader;
pub use self::xlsx::XlsxReader;

/// A reader that can load a source identifier into a [`Table`].
///
/// # Examples
///
/// ```rust,no_run
/// use eda_core::sources::{DataReader, DelimitedReader};
///
/// # async fn example() -> eda_core::error::Result<()> {
/// let reader = DelimitedReader::new(b',');
/// let table = reader.read_data("data/users.csv", 0).await?;
/// println!("{:?}", table.shape());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataReader: Debug + Send + Sync {
    /// Reads the source into a table. `sheet_index` selects a tab for
    /// multi-sheet sources and is ignored otherwise.
    async fn read_data(&self, source: &str, sheet_index: usize) -> Result<Table>;

    /// Lists the tabs of the source. Single-sheet sources report one entry.
    async fn list_sheets(&self, source: &str) -> Result<Vec<SheetInfo>> {
        Ok(vec![SheetInfo {
            index: 0,
            title: table_name(source),
        }])
    }

    /// Returns a human-readable description of this reader.
    fn description(&self) -> String;
}

/// One tab of a multi-sheet source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetInfo {
    pub index: usize,
    pub title: String,
}

/// The source kinds the factory can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Google Sheets (`gs://<id>`)
    Spreadsheet,
    /// Delimited text with a single-byte delimiter
    Delimited { delimiter: u8 },
    /// Excel workbook
    Workbook,
    /// Parquet
    Columnar,
    /// Newline-delimited JSON
    JsonLines,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Spreadsheet => "google-sheets",
            SourceKind::Delimited { .. } => "csv",
            SourceKind::Workbook => "xlsx",
            SourceKind::Columnar => "parquet",
            SourceKind::JsonLines => "json",
        }
    }
}

/// The closed set of readers.
#[derive(Debug)]
pub enum Reader {
    Spreadsheet(SheetsReader),
    Delimited(DelimitedReader),
    Workbook(XlsxReader),
    Columnar(ParquetReader),
    JsonLines(JsonLinesReader),
}

impl Reader {
    /// The kind of source this reader handles.
    pub fn kind(&self) -> SourceKind {
        match self {
            Reader::Spreadsheet(_) => SourceKind::Spreadsheet,
            Reader::Delimited(r) => SourceKind::Delimited {
                delimiter: r.delimiter(),
            },
            Reader::Workbook(_) => SourceKind::Workbook,
            Reader::Columnar(_) => SourceKind::Columnar,
            Reader::JsonLines(_) => SourceKind::JsonLines,
        }
    }

    fn inner(&self) -> &dyn DataReader {
        match self {
            Reader::Spreadsheet(r) => r,
            Reader::Delimited(r) => r,
            Reader::Workbook(r) => r,
            Reader::Columnar(r) => r,
            Reader::JsonLines(r) => r,
        }
    }
}

#[async_trait]
impl DataReader for Reader {
    async fn read_data(&self, source: &str, sheet_index: usize) -> Result<Table> {
        self.inner().read_data(source, sheet_index).await
    }

    async fn list_sheets(&self, source: &str) -> Result<Vec<SheetInfo>> {
        self.inner().list_sheets(source).await
    }

    fn description(&self) -> String {
        self.inner().description()
    }
}

/// Table name derived from a source identifier: the file stem, or the
/// spreadsheet id.
pub(crate) fn table_name(source: &str) -> String {
    if let Some(id) = source.strip_prefix(SHEETS_SCHEME) {
        return id.to_string();
    }
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source)
        .to_string()
}

/// Fails with `SourceRead` when `path` is not an existing file.
pub(crate) fn ensure_file(kind: &str, path: &str) -> Result<()> {
    if Path::new(path).is_file() {
        Ok(())
    } else {
        Err(EdaError::source_read(kind, format!("file not found: {path}")))
    }
}

/// The `.ext` suffix DataFusion should list for `path`.
pub(crate) fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Collects a DataFusion frame into a table, reporting any failure as a
/// read error of `kind`.
pub(crate) async fn collect_frame(
    kind: &str,
    source: &str,
    frame: datafusion::error::Result<DataFrame>,
) -> Result<Table> {
    let frame = frame.read_context(kind, source)?;
    let schema = frame.schema().inner().clone();
    let batches = frame.collect().await.read_context(kind, source)?;
    debug!(kind, source, batches = batches.len(), "Collected source");
    Table::from_record_batches(table_name(source), &schema, &batches)
}

/// Header names for grid sources: blanks become `Unnamed: <i>` and repeats
/// get a `.1`, `.2` ... suffix.
pub(crate) fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    for (index, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("/data/sales.csv"), "sales");
        assert_eq!(table_name("gs://abc123"), "abc123");
        assert_eq!(table_name("report.tar.parquet"), "report.tar");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a/b/c.tsv"), ".tsv");
        assert_eq!(file_extension("noext"), "");
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(vec![
            "a".into(),
            "".into(),
            "a".into(),
            "b".into(),
            "a".into(),
        ]);
        assert_eq!(headers, vec!["a", "Unnamed: 1", "a.1", "b", "a.2"]);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let err = ensure_file("csv", "/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, EdaError::SourceRead { .. }));
    }
}
