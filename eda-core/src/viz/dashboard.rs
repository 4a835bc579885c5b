//! Plotly dashboard.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::debug;

use super::{Artifact, Visualizer};
use crate::analysis::CorrelationMatrix;
use crate::prelude::*;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const TITLE: &str = "Dataset Visualization Dashboard";
const MAX_SERIES: usize = 3;
const PANEL_HEIGHT: usize = 300;

/// Renders the dataset dashboard as Plotly traces on a 2x2 grid, with a
/// third row of value-count bars when the table has text columns.
///
/// Panels: correlation heatmap, box plot per numeric column, missing values
/// per column, and either time series against a `date` column or a scatter
/// of the first two numeric columns.
#[derive(Debug, Clone)]
pub struct PlotlyDashboard {
    width: usize,
}

impl Default for PlotlyDashboard {
    fn default() -> Self {
        Self { width: 1000 }
    }
}

impl PlotlyDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    fn traces(&self, table: &Table, correlation: Option<&CorrelationMatrix>) -> Vec<Value> {
        let numeric = table.numeric_columns();
        let text = table.text_columns();
        let mut traces = Vec::new();

        if let Some(matrix) = correlation {
            // Undefined coefficients become gaps in the heatmap
            let z: Vec<Vec<Option<f64>>> = matrix
                .values
                .iter()
                .map(|row| row.iter().map(|r| r.is_finite().then_some(*r)).collect())
                .collect();
            traces.push(json!({
                "type": "heatmap",
                "z": z,
                "x": matrix.columns,
                "y": matrix.columns,
                "xaxis": "x",
                "yaxis": "y",
            }));
        }

        for column in &numeric {
            traces.push(json!({
                "type": "box",
                "y": plot_values(column),
                "name": column.name(),
                "xaxis": "x2",
                "yaxis": "y2",
            }));
        }

        let missing: Vec<usize> = table.columns().iter().map(Column::null_count).collect();
        traces.push(json!({
            "type": "bar",
            "x": table.column_names(),
            "y": missing,
            "name": "Missing Values",
            "xaxis": "x3",
            "yaxis": "y3",
        }));

        if let Some(date) = table.column("date") {
            let x: Vec<Value> = date.values().iter().map(cell_json).collect();
            for column in numeric.iter().take(MAX_SERIES) {
                traces.push(json!({
                    "type": "scatter",
                    "x": x,
                    "y": plot_values(column),
                    "name": column.name(),
                    "xaxis": "x4",
                    "yaxis": "y4",
                }));
            }
        } else if numeric.len() >= 2 {
            traces.push(json!({
                "type": "scatter",
                "mode": "markers",
                "x": plot_values(numeric[0]),
                "y": plot_values(numeric[1]),
                "name": format!("{} vs {}", numeric[0].name(), numeric[1].name()),
                "xaxis": "x4",
                "yaxis": "y4",
            }));
        }

        for (index, column) in text.iter().take(MAX_SERIES).enumerate() {
            let (labels, counts): (Vec<String>, Vec<usize>) = value_counts(column).into_iter().unzip();
            // First two text columns share the left panel, the third goes right
            let axis = if index > 1 { 6 } else { 5 };
            traces.push(json!({
                "type": "bar",
                "x": labels,
                "y": counts,
                "name": column.name(),
                "xaxis": format!("x{axis}"),
                "yaxis": format!("y{axis}"),
            }));
        }

        traces
    }

    fn layout(&self, table: &Table) -> Value {
        let has_text = !table.text_columns().is_empty();
        let rows = if has_text { 3 } else { 2 };
        let trend = if table.column("date").is_some() {
            "Time Series"
        } else {
            "Scatter Matrix"
        };

        let mut titles = vec![
            "Correlation Heatmap",
            "Distribution Overview",
            "Missing Values",
            trend,
        ];
        if has_text {
            titles.push("Category Distributions");
        }

        let row_height = 1.0 / rows as f64;
        let annotations: Vec<Value> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                let (row, col) = (i / 2, i % 2);
                json!({
                    "text": title,
                    "showarrow": false,
                    "xref": "paper",
                    "yref": "paper",
                    "x": if col == 0 { 0.225 } else { 0.775 },
                    "y": 1.0 - row as f64 * row_height,
                    "xanchor": "center",
                    "yanchor": "bottom",
                })
            })
            .collect();

        json!({
            "title": { "text": TITLE },
            "height": PANEL_HEIGHT * rows,
            "width": self.width,
            "showlegend": true,
            "grid": { "rows": rows, "columns": 2, "pattern": "independent" },
            "annotations": annotations,
        })
    }
}

impl Visualizer for PlotlyDashboard {
    fn render(&self, table: &Table, correlation: Option<&CorrelationMatrix>) -> Result<Artifact> {
        let traces = self.traces(table, correlation);
        debug!(traces = traces.len(), table = table.name(), "Rendering dashboard");

        let data = script_json(&Value::Array(traces))?;
        let layout = script_json(&self.layout(table))?;
        let title = format!("{TITLE}: {}", table.name());

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
             <script src=\"{PLOTLY_CDN}\"></script>\n</head>\n<body>\n\
             <div id=\"dashboard\"></div>\n<script>\n\
             Plotly.newPlot(\"dashboard\", {data}, {layout});\n</script>\n</body>\n</html>\n",
            escape_html(&title)
        );

        Ok(Artifact { title, html })
    }
}

/// JSON safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn plot_values(column: &Column) -> Vec<Option<f64>> {
    column.values().iter().map(CellValue::as_f64).collect()
}

fn cell_json(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::Integer(v) => json!(v),
        CellValue::Float(v) => json!(v),
        CellValue::Boolean(v) => json!(v),
        other => Value::String(other.to_string()),
    }
}

/// Value counts in descending order, ties broken by value.
fn value_counts(column: &Column) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in column.values().iter().filter(|v| !v.is_null()) {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<Column>) -> Table {
        Table::new("sales", columns).unwrap()
    }

    fn ints(name: &str, values: &[i64]) -> Column {
        Column::new(
            name,
            DataKind::Integer,
            values.iter().map(|v| CellValue::Integer(*v)).collect(),
        )
    }

    fn texts(name: &str, values: &[&str]) -> Column {
        Column::new(
            name,
            DataKind::Text,
            values.iter().map(|v| CellValue::Text(v.to_string())).collect(),
        )
    }

    fn matrix(columns: &[&str], r: f64) -> CorrelationMatrix {
        CorrelationMatrix {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values: vec![vec![1.0, r], vec![r, 1.0]],
        }
    }

    fn trace_types(table: &Table, correlation: Option<&CorrelationMatrix>) -> Vec<String> {
        PlotlyDashboard::new()
            .traces(table, correlation)
            .iter()
            .map(|t| t["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_numeric_table_gets_heatmap_boxes_and_scatter() {
        let t = table(vec![ints("a", &[1, 2, 3]), ints("b", &[2, 4, 7])]);
        assert_eq!(
            trace_types(&t, Some(&matrix(&["a", "b"], 0.99))),
            vec!["heatmap", "box", "box", "bar", "scatter"]
        );
        assert_eq!(trace_types(&t, None), vec!["box", "box", "bar", "scatter"]);
    }

    #[test]
    fn test_heatmap_uses_the_given_matrix() {
        let t = table(vec![ints("a", &[1, 2, 3]), ints("b", &[5, 5, 5])]);
        let traces = PlotlyDashboard::new().traces(&t, Some(&matrix(&["a", "b"], f64::NAN)));

        let heatmap = &traces[0];
        assert_eq!(heatmap["x"], json!(["a", "b"]));
        assert_eq!(heatmap["z"], json!([[1.0, null], [null, 1.0]]));
    }

    #[test]
    fn test_date_column_switches_to_time_series() {
        let t = table(vec![
            texts("date", &["2024-01-01", "2024-01-02"]),
            ints("v", &[1, 2]),
        ]);
        let traces = PlotlyDashboard::new().traces(&t, None);
        let series: Vec<_> = traces.iter().filter(|t| t["xaxis"] == "x4").collect();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["name"], "v");

        let layout = PlotlyDashboard::new().layout(&t);
        assert_eq!(layout["annotations"][3]["text"], "Time Series");
        assert_eq!(layout["grid"]["rows"], 3);
    }

    #[test]
    fn test_value_counts_order() {
        let counts = value_counts(&texts("c", &["b", "a", "b", "c", "a", "b"]));
        assert_eq!(
            counts,
            vec![("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_render_embeds_traces_safely() {
        let t = table(vec![texts("note", &["</script><b>"])]);
        let artifact = PlotlyDashboard::new().render(&t, None).unwrap();

        assert!(artifact.html.contains(PLOTLY_CDN));
        assert!(artifact.html.contains("Plotly.newPlot"));
        assert!(!artifact.html.contains("</script><b>"));
        assert_eq!(artifact.title, "Dataset Visualization Dashboard: sales");
    }
}
