//! Report formatting.
//!
//! [`HumanFormatter`] renders an [`AnalysisReport`] as titled text sections
//! (optionally with ANSI colors) and [`JsonFormatter`] serializes it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use eda_core::analysis::AnalysisOrchestrator;
//! use eda_core::formatters::{HumanFormatter, JsonFormatter, ReportFormatter};
//! use eda_core::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let orchestrator = AnalysisOrchestrator::builder(EdaConfig::default()).build();
//! let report = orchestrator.run("data.csv", 0, &AnalysisOptions::new()).await?;
//!
//! println!("{}", HumanFormatter::new().format(&report)?);
//! println!("{}", JsonFormatter::new().format(&report)?);
//! # Ok(())
//! # }
//! ```

use std::fmt::Write;

use crate::analysis::{
    AdvancedStats, AnalysisReport, ColumnDescription, ColumnInfo, ColumnSummary,
    CorrelationMatrix, NormalityOutcome, StageOutcome, MIN_NORMALITY_SAMPLE,
};
use crate::prelude::*;
use crate::table::format_float;

const BOLD_GREEN: &str = "1;32";
const BOLD_RED: &str = "1;31";
const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";
const MAGENTA: &str = "35";

/// Renders an analysis report into a string.
pub trait ReportFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String>;
}

/// Serializes the report as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        json.map_err(|e| EdaError::Internal(format!("Failed to serialize report to JSON: {e}")))
    }
}

/// Formats the report as terminal text.
///
/// Each section is a title underlined with `=` followed by its content:
/// `Dataset Overview`, `Column Information`, `Missing Values` and `Summary
/// Statistics`, then the optional stages that ran.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    use_colors: bool,
}

impl HumanFormatter {
    /// A formatter with ANSI colors.
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// A formatter without colors.
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if self.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn section(&self, title: &str, content: &str) -> String {
        format!(
            "\n{}\n{}\n{content}",
            self.paint(title, BOLD_GREEN),
            "=".repeat(title.chars().count())
        )
    }

    fn failure(&self, stage: &str, message: &str) -> String {
        self.paint(&format!("{stage} failed: {message}"), BOLD_RED)
    }

    fn missing_block(&self, columns: &[ColumnInfo]) -> String {
        let mut out = String::new();
        for column in columns {
            let color = if column.missing > 0 { RED } else { GREEN };
            out.push('\n');
            out.push_str(&column.name);
            out.push_str(": ");
            out.push_str(&self.paint(&column.missing.to_string(), color));
        }
        out
    }

    fn advanced_sections(&self, stats: &AdvancedStats) -> std::result::Result<Vec<String>, std::fmt::Error> {
        let mut sections = Vec::new();
        if let Some(matrix) = &stats.correlation {
            sections.push(self.section("Correlation Matrix", &correlation_block(matrix)));
        }

        let mut tests = String::new();
        for (i, test) in stats.normality.iter().enumerate() {
            if i > 0 {
                tests.push('\n');
            }
            write!(tests, "{} Normality Test:", test.column)?;
            match &test.outcome {
                NormalityOutcome::Tested {
                    statistic,
                    p_value,
                    looks_normal,
                } => {
                    write!(tests, "\n  Statistic: {statistic:.4}")?;
                    write!(tests, "\n  P-value: {p_value:.4}")?;
                    let verdict = if *looks_normal { "Normal" } else { "Not normal" };
                    write!(tests, "\n  Result: {verdict}")?;
                }
                NormalityOutcome::InsufficientData { count } => {
                    write!(
                        tests,
                        "\n  Result: insufficient data ({count} values, need at least {MIN_NORMALITY_SAMPLE})"
                    )?;
                }
                NormalityOutcome::Constant => write!(tests, "\n  Result: constant column")?,
            }
        }
        if !stats.normality.is_empty() {
            sections.push(self.section("Statistical Tests", &tests));
        }

        let mut outliers = format!("Threshold: |z| > {}", stats.threshold);
        for column in &stats.outliers {
            let count = self.paint(
                &column.count.to_string(),
                if column.count > 0 { RED } else { GREEN },
            );
            write!(outliers, "\n{}: {count}", column.column)?;
            if !column.values.is_empty() {
                let values: Vec<String> = column.values.iter().map(|v| format_float(*v)).collect();
                write!(outliers, " ({})", values.join(", "))?;
            }
        }
        sections.push(self.section("Outliers", &outliers));
        Ok(sections)
    }

    fn render(&self, report: &AnalysisReport) -> std::result::Result<String, std::fmt::Error> {
        let (rows, columns) = report.overview.shape();
        let mut sections = vec![
            self.section(
                "Dataset Overview",
                &format!("Shape: {}", self.paint(&format!("({rows}, {columns})"), YELLOW)),
            ),
            self.section("Column Information", &column_kinds_block(&report.columns)),
            self.section("Missing Values", &self.missing_block(&report.columns)),
            self.section("Summary Statistics", &describe_block(&report.summary)),
        ];

        match &report.advanced {
            Some(StageOutcome::Completed(stats)) => sections.extend(self.advanced_sections(stats)?),
            Some(StageOutcome::Failed { stage, message }) => {
                sections.push(format!("\n{}", self.failure(stage, message)))
            }
            None => {}
        }

        match &report.visualization {
            Some(StageOutcome::Completed(_)) => sections.push(format!(
                "\n{}",
                self.paint("Visualizations opened in your browser.", MAGENTA)
            )),
            Some(StageOutcome::Failed { stage, message }) => {
                sections.push(format!("\n{}", self.failure(stage, message)))
            }
            None => {}
        }

        if let Some(narrative) = &report.narrative {
            let title = format!("LLM Analysis (using prompt: '{}')", narrative.prompt);
            let content = match &narrative.outcome {
                StageOutcome::Completed(_) => String::new(),
                StageOutcome::Failed { stage, message } => self.failure(stage, message),
            };
            sections.push(self.section(&title, &content));
        }

        Ok(sections.join("\n"))
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &AnalysisReport) -> Result<String> {
        self.render(report)
            .map_err(|e| EdaError::Internal(format!("Failed to format report: {e}")))
    }
}

/// `name    kind` per column, names padded to a common width.
pub fn column_kinds_block(columns: &[ColumnInfo]) -> String {
    let width = columns.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    columns
        .iter()
        .map(|c| format!("{:<width$}    {}", c.name, c.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The describe table: one column per dataset column, one row per statistic.
///
/// Rows that apply to no column are left out, and cells that do not apply to
/// a column read `NaN`.
pub fn describe_block(summary: &[ColumnDescription]) -> String {
    if summary.is_empty() {
        return "(no columns)".to_string();
    }

    let has_categorical = summary
        .iter()
        .any(|d| matches!(d.summary, ColumnSummary::Categorical(_)));
    let has_numeric = summary
        .iter()
        .any(|d| matches!(d.summary, ColumnSummary::Numeric(_)));

    let mut labels = vec!["count"];
    if has_categorical {
        labels.extend(["unique", "top", "freq"]);
    }
    if has_numeric {
        labels.extend(["mean", "std", "min", "25%", "50%", "75%", "max"]);
    }

    let cells: Vec<Vec<String>> = summary
        .iter()
        .map(|d| labels.iter().map(|label| describe_cell(&d.summary, label)).collect())
        .collect();
    let headers: Vec<&str> = summary.iter().map(|d| d.name.as_str()).collect();
    grid(&labels, &headers, &cells)
}

fn describe_cell(summary: &ColumnSummary, label: &str) -> String {
    let nan = || "NaN".to_string();
    match summary {
        ColumnSummary::Numeric(s) => {
            let value = match label {
                "count" => return s.count.to_string(),
                "mean" => s.mean,
                "std" => s.std,
                "min" => s.min,
                "25%" => s.q25,
                "50%" => s.median,
                "75%" => s.q75,
                "max" => s.max,
                _ => None,
            };
            value.map(|v| format!("{v:.6}")).unwrap_or_else(nan)
        }
        ColumnSummary::Categorical(s) => match label {
            "count" => s.count.to_string(),
            "unique" => s.unique.to_string(),
            "top" => s.top.clone().unwrap_or_else(nan),
            "freq" => s.freq.map(|f| f.to_string()).unwrap_or_else(nan),
            _ => nan(),
        },
    }
}

fn correlation_block(matrix: &CorrelationMatrix) -> String {
    let labels: Vec<&str> = matrix.columns.iter().map(String::as_str).collect();
    let cells: Vec<Vec<String>> = (0..labels.len())
        .map(|j| {
            matrix
                .values
                .iter()
                .map(|row| {
                    let v = row[j];
                    if v.is_nan() {
                        "NaN".to_string()
                    } else {
                        format!("{v:.6}")
                    }
                })
                .collect()
        })
        .collect();
    grid(&labels, &labels, &cells)
}

/// Right-aligned table with row labels on the left. `cells[column][row]`.
fn grid(labels: &[&str], headers: &[&str], cells: &[Vec<String>]) -> String {
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let widths: Vec<usize> = headers
        .iter()
        .zip(cells)
        .map(|(header, column)| {
            column
                .iter()
                .map(|c| c.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(labels.len() + 1);
    let mut header_line = " ".repeat(label_width);
    for (header, width) in headers.iter().zip(&widths) {
        header_line.push_str(&format!("  {header:>width$}"));
    }
    lines.push(header_line);

    for (row, label) in labels.iter().enumerate() {
        let mut line = format!("{label:<label_width$}");
        for (column, width) in cells.iter().zip(&widths) {
            line.push_str(&format!("  {:>width$}", column[row]));
        }
        lines.push(line);
    }
    lines.join("\n")
}
