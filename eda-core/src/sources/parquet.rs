//! Parquet reader.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{info, instrument};

use super::{collect_frame, ensure_file, file_extension, DataReader};
use crate::prelude::*;

const KIND: &str = "parquet";

/// Reads a Parquet file. Column kinds come from the embedded schema.
#[derive(Debug, Clone, Default)]
pub struct ParquetReader;

impl ParquetReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataReader for ParquetReader {
    #[instrument(skip(self), fields(source.type = "parquet"))]
    async fn read_data(&self, source: &str, _sheet_index: usize) -> Result<Table> {
        ensure_file(KIND, source)?;
        info!(source, "Reading Parquet file");

        let extension = file_extension(source);
        let mut options = ParquetReadOptions::default();
        options.file_extension = &extension;

        let ctx = SessionContext::new();
        collect_frame(KIND, source, ctx.read_parquet(source, options).await).await
    }

    fn description(&self) -> String {
        "Parquet file".to_string()
    }
}
