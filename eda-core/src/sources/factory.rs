//! Reader selection by source identifier.

use std::sync::Arc;

use tracing::debug;

use super::{
    DelimitedReader, JsonLinesReader, ParquetReader, Reader, SheetsReader, SourceKind, XlsxReader,
};
use crate::auth::{GoogleTokenProvider, TokenProvider};
use crate::prelude::*;

/// Scheme prefix of a Google Sheets source.
pub const SHEETS_SCHEME: &str = "gs://";

const BUILTIN_SUFFIXES: &[(&str, SourceKind)] = &[
    (".csv", SourceKind::Delimited { delimiter: b',' }),
    (".tsv", SourceKind::Delimited { delimiter: b'\t' }),
    (".xlsx", SourceKind::Workbook),
    (".parquet", SourceKind::Columnar),
    (".json", SourceKind::JsonLines),
];

/// Picks the reader for a source identifier.
///
/// Rules are checked in order and the first match wins: the `gs://` prefix,
/// then the built-in suffixes `.csv`, `.tsv`, `.xlsx`, `.parquet` and
/// `.json`, then any suffixes added with [`register_suffix`]. Selection is
/// pure string inspection.
///
/// [`register_suffix`]: ReaderFactory::register_suffix
///
/// # Examples
///
/// ```rust
/// use eda_core::config::EdaConfig;
/// use eda_core::sources::{ReaderFactory, SourceKind};
///
/// let mut factory = ReaderFactory::new(EdaConfig::default());
/// factory.register_suffix(".jsonl", SourceKind::JsonLines);
///
/// assert_eq!(factory.kind_for("events.jsonl").unwrap(), SourceKind::JsonLines);
/// assert!(factory.kind_for("notes.txt").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ReaderFactory {
    config: EdaConfig,
    tokens: Option<Arc<dyn TokenProvider>>,
    extra_suffixes: Vec<(String, SourceKind)>,
}

impl ReaderFactory {
    pub fn new(config: EdaConfig) -> Self {
        Self {
            config,
            tokens: None,
            extra_suffixes: Vec::new(),
        }
    }

    /// Uses `tokens` for spreadsheet sources instead of the file-backed
    /// Google provider.
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Adds a suffix rule checked after the built-in ones.
    pub fn register_suffix(&mut self, suffix: impl Into<String>, kind: SourceKind) {
        self.extra_suffixes.push((suffix.into(), kind));
    }

    /// The source kind `source` dispatches to.
    pub fn kind_for(&self, source: &str) -> Result<SourceKind> {
        if source.starts_with(SHEETS_SCHEME) {
            return Ok(SourceKind::Spreadsheet);
        }
        BUILTIN_SUFFIXES
            .iter()
            .map(|(suffix, kind)| (*suffix, *kind))
            .chain(self.extra_suffixes.iter().map(|(s, k)| (s.as_str(), *k)))
            .find(|(suffix, _)| source.ends_with(suffix))
            .map(|(_, kind)| kind)
            .ok_or_else(|| EdaError::unsupported(source))
    }

    /// Builds the reader for `source`.
    pub fn select_reader(&self, source: &str) -> Result<Reader> {
        let kind = self.kind_for(source)?;
        debug!(source, kind = kind.name(), "Selected reader");

        Ok(match kind {
            SourceKind::Spreadsheet => {
                let tokens = match &self.tokens {
                    Some(tokens) => tokens.clone(),
                    None => Arc::new(GoogleTokenProvider::new(&self.config)?),
                };
                Reader::Spreadsheet(SheetsReader::new(&self.config, tokens)?)
            }
            SourceKind::Delimited { delimiter } => Reader::Delimited(DelimitedReader::new(delimiter)),
            SourceKind::Workbook => Reader::Workbook(XlsxReader::new()),
            SourceKind::Columnar => Reader::Columnar(ParquetReader::new()),
            SourceKind::JsonLines => Reader::JsonLines(JsonLinesReader::new()),
        })
    }
}
