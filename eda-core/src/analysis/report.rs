//! The typed result of an analysis run.

use std::fmt::Display;
use std::path::PathBuf;

use serde::Serialize;

use super::advanced::AdvancedStats;
use super::describe::ColumnDescription;
use crate::narrative::PromptKind;
use crate::prelude::*;

/// Outcome of an optional stage. A failed stage never removes the base
/// statistics from the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed(T),
    Failed { stage: String, message: String },
}

impl<T> StageOutcome<T> {
    pub fn from_result<E: Display>(stage: &str, result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => StageOutcome::Completed(value),
            Err(e) => StageOutcome::Failed {
                stage: stage.to_string(),
                message: e.to_string(),
            },
        }
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

impl DatasetOverview {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }
}

/// Kind and missing-value count of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: DataKind,
    pub missing: usize,
}

impl ColumnInfo {
    pub fn from_table(table: &Table) -> Vec<ColumnInfo> {
        table
            .columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                kind: c.kind(),
                missing: c.null_count(),
            })
            .collect()
    }
}

/// The narrative stage: which prompt was used and what came back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSection {
    pub prompt: PromptKind,
    pub model: String,
    pub outcome: StageOutcome<String>,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub source: String,
    pub overview: DatasetOverview,
    pub columns: Vec<ColumnInfo>,
    pub summary: Vec<ColumnDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<StageOutcome<AdvancedStats>>,
    /// Path of the staged dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<StageOutcome<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeSection>,
}

impl AnalysisReport {
    /// The narrative text, when the stage ran and succeeded.
    pub fn narrative_text(&self) -> Option<&str> {
        self.narrative
            .as_ref()
            .and_then(|n| n.outcome.completed())
            .map(String::as_str)
    }
}
