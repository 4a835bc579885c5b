//! # eda-core - Exploratory Data Analysis for Rust
//!
//! eda-core loads a tabular data source into a normalized [`Table`], computes
//! descriptive statistics over it with DataFusion, and optionally adds
//! advanced statistics, an HTML chart dashboard and a narrative written by a
//! local language model.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eda_core::prelude::*;
//! use eda_core::analysis::AnalysisOrchestrator;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = AnalysisOrchestrator::builder(EdaConfig::from_env()).build();
//! let options = AnalysisOptions::new().with_advanced(true);
//!
//! let (report, narrative) = orchestrator.analyze("data/sales.csv", 0, &options).await;
//! println!("{report}");
//! if let Some(text) = narrative {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Sources
//!
//! The [`sources::ReaderFactory`] picks a reader from the shape of the source
//! identifier:
//!
//! - `gs://<spreadsheet-id>`: Google Sheets, cells typed by [`inference::TypeInferrer`]
//! - `.csv` / `.tsv`: delimited text
//! - `.xlsx`: Excel workbook
//! - `.parquet`: Parquet
//! - `.json`: newline-delimited JSON
//!
//! ## Architecture
//!
//! - **`table`**: the `Table` model and its Arrow bridge
//! - **`inference`**: per-cell type inference and column reconciliation
//! - **`sources`**: readers and the factory that selects them
//! - **`auth`**: credential store and OAuth token provider for Google Sheets
//! - **`analysis`**: statistics, prompt-kind detection and the orchestrator
//! - **`narrative`**: prompt templates and the Ollama client
//! - **`viz`**: the Plotly dashboard and the viewer that opens it
//! - **`formatters`**: human and JSON report rendering

pub mod analysis;
pub mod auth;
pub mod config;
pub mod error;
pub mod formatters;
pub mod inference;
pub mod logging;
pub mod narrative;
pub mod prelude;
pub mod sources;
pub mod table;
pub mod viz;

pub use crate::table::Table;
