//! Google Sheets reader.
//!
//! Cells arrive as formatted text, so every cell goes through
//! [`TypeInferrer`] and each column is reconciled strictly: any disagreement
//! between non-null cells makes the column text.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::{unique_headers, DataReader, SheetInfo, SHEETS_SCHEME};
use crate::auth::TokenProvider;
use crate::inference::{reconcile, InferredCell, Reconciliation, TypeInferrer};
use crate::logging::truncate_field;
use crate::prelude::*;

const KIND: &str = "google-sheets";

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads one worksheet of a Google spreadsheet through the Sheets v4 API.
#[derive(Debug, Clone)]
pub struct SheetsReader {
    api_base: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    inferrer: TypeInferrer,
}

impl SheetsReader {
    /// Creates a reader that authenticates through `tokens`.
    pub fn new(config: &EdaConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EdaError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_base: config.sheets_api_base.trim_end_matches('/').to_string(),
            http,
            tokens,
            inferrer: TypeInferrer::new(),
        })
    }

    fn spreadsheet_id(source: &str) -> Result<&str> {
        let id = source.strip_prefix(SHEETS_SCHEME).unwrap_or(source).trim_matches('/');
        if id.is_empty() {
            return Err(EdaError::source_read(KIND, format!("no spreadsheet id in '{source}'")));
        }
        Ok(id)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| EdaError::Configuration(format!("invalid Sheets API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| EdaError::Configuration("Sheets API base cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let token = self.tokens.access_token().await?;
        debug!(url = %url, "Calling Sheets API");

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .read_context(KIND, "request failed")?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(EdaError::Authentication(format!(
                "Sheets API returned {status}: {}",
                truncate_field(&body, 200)
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EdaError::source_read(
                KIND,
                format!("Sheets API returned {status}: {}", truncate_field(&body, 200)),
            ));
        }

        response
            .json()
            .await
            .read_context(KIND, "unexpected response")
    }

    async fn sheet_titles(&self, id: &str) -> Result<Vec<String>> {
        let mut url = self.endpoint(&["v4", "spreadsheets", id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        let spreadsheet: Spreadsheet = self.get_json(url).await?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    /// Header row plus inferred, reconciled columns. Short rows are padded
    /// with empty cells.
    fn build_table(&self, name: String, mut rows: Vec<Vec<String>>) -> Result<Table> {
        if rows.is_empty() {
            return Ok(Table::empty(name));
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, String::new());
        }

        let mut rows = rows.into_iter();
        let headers = unique_headers(rows.next().unwrap_or_default());

        let mut columns: Vec<Vec<InferredCell>> = vec![Vec::new(); width];
        for row in rows {
            for (index, text) in row.iter().enumerate() {
                columns[index].push(self.inferrer.infer_cell(text));
            }
        }

        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(header, cells)| reconcile(header, cells, Reconciliation::Strict))
            .collect();
        Table::new(name, columns)
    }
}

/// A1 range naming a whole sheet.
fn quoted_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[async_trait]
impl DataReader for SheetsReader {
    #[instrument(skip(self), fields(source.type = "google-sheets"))]
    async fn read_data(&self, source: &str, sheet_index: usize) -> Result<Table> {
        let id = Self::spreadsheet_id(source)?;
        let titles = self.sheet_titles(id).await?;
        let title = titles.get(sheet_index).ok_or(EdaError::SheetIndexOutOfRange {
            index: sheet_index,
            count: titles.len(),
        })?;
        info!(spreadsheet = id, sheet = %title, "Reading worksheet");

        let url = self.endpoint(&["v4", "spreadsheets", id, "values", &quoted_range(title)])?;
        let range: ValueRange = self.get_json(url).await?;
        debug!(rows = range.values.len(), "Fetched worksheet values");

        self.build_table(format!("{id}/{title}"), range.values)
    }

    async fn list_sheets(&self, source: &str) -> Result<Vec<SheetInfo>> {
        let id = Self::spreadsheet_id(source)?;
        Ok(self
            .sheet_titles(id)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, title)| SheetInfo { index, title })
            .collect())
    }

    fn description(&self) -> String {
        "Google Sheets spreadsheet".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn reader() -> SheetsReader {
        SheetsReader::new(
            &EdaConfig::default(),
            Arc::new(StaticTokenProvider::new("t")),
        )
        .unwrap()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_spreadsheet_id() {
        assert_eq!(SheetsReader::spreadsheet_id("gs://abc").unwrap(), "abc");
        assert!(SheetsReader::spreadsheet_id("gs://").is_err());
    }

    #[test]
    fn test_quoted_range() {
        assert_eq!(quoted_range("Sheet1"), "'Sheet1'");
        assert_eq!(quoted_range("Bob's data"), "'Bob''s data'");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = reader()
            .endpoint(&["v4", "spreadsheets", "abc", "values", "'My Sheet'"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'My%20Sheet'"
        );
    }

    #[test]
    fn test_build_table_infers_per_cell() {
        let table = reader()
            .build_table(
                "t".into(),
                rows(&[
                    &["id", "code", "when", "note"],
                    &["1", "1", "2024-01-05", "a"],
                    &["2", "x", "", ""],
                    &["3"],
                ]),
            )
            .unwrap();

        assert_eq!(table.shape(), (3, 4));
        assert_eq!(table.column("id").unwrap().kind(), DataKind::Integer);
        assert_eq!(table.column("code").unwrap().kind(), DataKind::Text);
        assert_eq!(
            table.column("code").unwrap().values()[0],
            CellValue::Text("1".into())
        );
        assert_eq!(table.column("when").unwrap().kind(), DataKind::Timestamp);
        assert_eq!(table.column("note").unwrap().null_count(), 2);
    }

    #[test]
    fn test_build_table_empty_grid() {
        let table = reader().build_table("t".into(), vec![]).unwrap();
        assert_eq!(table.shape(), (0, 0));

        let header_only = reader()
            .build_table("t".into(), rows(&[&["A", "B"]]))
            .unwrap();
        assert_eq!(header_only.shape(), (0, 2));
    }
}
