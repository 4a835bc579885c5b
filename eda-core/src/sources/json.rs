//! Newline-delimited JSON reader.

use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{info, instrument};

use super::{collect_frame, ensure_file, file_extension, DataReader};
use crate::prelude::*;

const KIND: &str = "json";

/// Reads one JSON object per line. The column set is the union of the keys
/// seen; kinds follow JSON's own number/string/boolean/null distinction.
#[derive(Debug, Clone)]
pub struct JsonLinesReader {
    schema_infer_max_records: usize,
}

impl Default for JsonLinesReader {
    fn default() -> Self {
        Self {
            schema_infer_max_records: 10_000,
        }
    }
}

impl JsonLinesReader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataReader for JsonLinesReader {
    #[instrument(skip(self), fields(source.type = "json"))]
    async fn read_data(&self, source: &str, _sheet_index: usize) -> Result<Table> {
        ensure_file(KIND, source)?;
        info!(source, "Reading JSON lines file");

        let extension = file_extension(source);
        let mut options = NdJsonReadOptions::default();
        options.file_extension = &extension;
        options.schema_infer_max_records = self.schema_infer_max_records;

        let ctx = SessionContext::new();
        collect_frame(KIND, source, ctx.read_json(source, options).await).await
    }

    fn description(&self) -> String {
        "JSON lines file".to_string()
    }
}
