//! Prelude for commonly used types and traits in eda-core.

pub use crate::config::{AnalysisOptions, EdaConfig};
pub use crate::error::{EdaError, ErrorContext, Result};
pub use crate::table::{CellValue, Column, DataKind, Table};
