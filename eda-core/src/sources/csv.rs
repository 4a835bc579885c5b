//! Delimited text (CSV/TSV) reader.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{info, instrument};

use super::{collect_frame, ensure_file, file_extension, DataReader};
use crate::prelude::*;

const KIND: &str = "csv";

/// Options for configuring delimited file reading.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the file has a header row
    pub has_header: bool,
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Quote character (default: '"')
    pub quote: u8,
    /// Maximum records to read for schema inference
    pub schema_infer_max_records: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            quote: b'"',
            schema_infer_max_records: 10_000,
        }
    }
}

/// Reads a delimited text file through DataFusion. Column kinds come from
/// DataFusion's schema inference over the whole column.
///
/// # Examples
///
/// ```rust,no_run
/// use eda_core::sources::{DataReader, DelimitedReader};
///
/// # async fn example() -> eda_core::error::Result<()> {
/// let table = DelimitedReader::new(b'\t').read_data("data/users.tsv", 0).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DelimitedReader {
    options: CsvOptions,
}

impl DelimitedReader {
    /// Creates a reader for the given delimiter.
    pub fn new(delimiter: u8) -> Self {
        Self {
            options: CsvOptions {
                delimiter,
                ..Default::default()
            },
        }
    }

    /// Creates a reader with custom options.
    pub fn with_options(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn delimiter(&self) -> u8 {
        self.options.delimiter
    }
}

#[async_trait]
impl DataReader for DelimitedReader {
    #[instrument(skip(self), fields(
        source.type = "csv",
        csv.delimiter = self.options.delimiter,
    ))]
    async fn read_data(&self, source: &str, _sheet_index: usize) -> Result<Table> {
        ensure_file(KIND, source)?;
        info!(source, "Reading delimited file");

        let extension = file_extension(source);
        let options = CsvReadOptions::new()
            .has_header(self.options.has_header)
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .schema_infer_max_records(self.options.schema_infer_max_records)
            .file_extension(&extension);

        let ctx = SessionContext::new();
        collect_frame(KIND, source, ctx.read_csv(source, options).await).await
    }

    fn description(&self) -> String {
        match self.options.delimiter {
            b'\t' => "Tab-separated file".to_string(),
            b',' => "CSV file".to_string(),
            other => format!("Delimited file ('{}')", other as char),
        }
    }
}
