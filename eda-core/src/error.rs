//! Error types for the EDA library.
//!
//! All failures are represented by the `EdaError` enum. Reader and factory
//! errors propagate unchanged up to the orchestrator, which is the only place
//! that turns them into a user-facing message.

use thiserror::Error;

/// The main error type for the EDA library.
#[derive(Error, Debug)]
pub enum EdaError {
    /// The source identifier matched no reader.
    #[error("Unsupported source: '{source_id}' (expected gs://<id> or a .csv, .tsv, .xlsx, .json or .parquet path)")]
    UnsupportedSourceKind {
        /// The unrecognized source identifier
        source_id: String,
    },

    /// The source exists but could not be read or parsed, or does not exist.
    #[error("Failed to read {kind} source: {message}")]
    SourceRead {
        /// Kind of source (e.g., "csv", "xlsx", "google-sheets")
        kind: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested sheet index is past the number of sheets.
    #[error("Sheet index {index} is out of range (source has {count} sheet(s))")]
    SheetIndexOutOfRange {
        /// Requested sheet index
        index: usize,
        /// Number of sheets in the source
        count: usize,
    },

    /// Credential acquisition or refresh failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The language model call failed.
    #[error("Narrative error: {0}")]
    Narrative(String),

    /// Rendering or presenting the dashboard failed.
    #[error("Visualization error: {0}")]
    Visualization(String),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, EdaError>`.
pub type Result<T> = std::result::Result<T, EdaError>;

impl EdaError {
    /// Creates an unsupported source error.
    pub fn unsupported(source_id: impl Into<String>) -> Self {
        Self::UnsupportedSourceKind {
            source_id: source_id.into(),
        }
    }

    /// Creates a new source read error.
    pub fn source_read(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new source read error with a source error.
    pub fn source_read_with_source(
        kind: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::SourceRead {
            kind: kind.into(),
            message: message.into(),
            source: Some(source),
        }
    }
}

impl From<serde_json::Error> for EdaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for EdaError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Turns a lower-level failure into a `SourceRead` error that keeps the
/// original as its source.
pub trait ErrorContext<T> {
    /// Wraps the error as a read failure of a `kind` source, prefixing its
    /// message with `msg`.
    fn read_context(self, kind: &str, msg: &str) -> Result<T>;

    /// Like [`read_context`](Self::read_context) with a lazily built message.
    fn with_read_context<F>(self, kind: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn read_context(self, kind: &str, msg: &str) -> Result<T> {
        self.with_read_context(kind, || msg.to_string())
    }

    fn with_read_context<F>(self, kind: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let message = format!("{}: {e}", f());
            EdaError::source_read_with_source(kind, message, Box::new(e))
        })
    }
}
