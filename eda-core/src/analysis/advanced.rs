//! Correlation matrix, normality tests and z-score outliers.

use serde::Serialize;
use tracing::{debug, instrument};

use super::describe::{first_f64, quote_ident, StatsContext, DATASET_TABLE};
use crate::prelude::*;

/// Smallest sample the skewness test accepts.
pub const MIN_NORMALITY_SAMPLE: usize = 8;

/// Significance level for "looks normal".
pub const NORMALITY_ALPHA: f64 = 0.05;

/// Pearson correlations between numeric columns. Undefined pairs are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

/// Result of the D'Agostino-Pearson test on one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NormalityOutcome {
    Tested {
        statistic: f64,
        p_value: f64,
        looks_normal: bool,
    },
    InsufficientData {
        count: usize,
    },
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityTest {
    pub column: String,
    pub outcome: NormalityOutcome,
}

/// Values of one column whose absolute z-score exceeds the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub count: usize,
    pub values: Vec<f64>,
}

/// Everything the advanced stage produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedStats {
    /// `None` with fewer than two numeric columns.
    pub correlation: Option<CorrelationMatrix>,
    pub normality: Vec<NormalityTest>,
    pub threshold: f64,
    pub outliers: Vec<ColumnOutliers>,
}

#[instrument(skip(stats, table), fields(table = table.name()))]
pub async fn advanced_stats(
    stats: &StatsContext,
    table: &Table,
    threshold: f64,
) -> Result<AdvancedStats> {
    let numeric = table.numeric_columns();
    let correlation = correlation_matrix(stats, &numeric).await?;

    let mut normality = Vec::with_capacity(numeric.len());
    let mut outliers = Vec::with_capacity(numeric.len());
    for column in &numeric {
        let values = column.numeric_values();
        normality.push(NormalityTest {
            column: column.name().to_string(),
            outcome: normaltest(&values),
        });
        let flagged = zscore_outliers(&values, threshold);
        outliers.push(ColumnOutliers {
            column: column.name().to_string(),
            count: flagged.len(),
            values: flagged,
        });
    }

    Ok(AdvancedStats {
        correlation,
        normality,
        threshold,
        outliers,
    })
}

/// `corr(a, b)` for every pair of numeric columns in one query.
pub async fn correlation_matrix(
    stats: &StatsContext,
    numeric: &[&Column],
) -> Result<Option<CorrelationMatrix>> {
    let n = numeric.len();
    if n < 2 {
        debug!(numeric = n, "Skipping correlation matrix");
        return Ok(None);
    }

    let mut pairs = Vec::new();
    let mut select = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            select.push(format!(
                "corr(CAST({} AS DOUBLE), CAST({} AS DOUBLE)) AS c{}",
                quote_ident(numeric[i].name()),
                quote_ident(numeric[j].name()),
                pairs.len()
            ));
            pairs.push((i, j));
        }
    }
    let batches = stats
        .query(&format!("SELECT {} FROM {DATASET_TABLE}", select.join(", ")))
        .await?;

    let mut values = vec![vec![f64::NAN; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    for (index, (i, j)) in pairs.into_iter().enumerate() {
        let r = first_f64(&batches, index)?.unwrap_or(f64::NAN);
        values[i][j] = r;
        values[j][i] = r;
    }

    Ok(Some(CorrelationMatrix {
        columns: numeric.iter().map(|c| c.name().to_string()).collect(),
        values,
    }))
}

/// Z-scores with population standard deviation. A zero-variance column has
/// no outliers.
pub fn zscore_outliers(values: &[f64], threshold: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std == 0.0 || !std.is_finite() {
        return Vec::new();
    }
    values
        .iter()
        .copied()
        .filter(|v| ((v - mean) / std).abs() > threshold)
        .collect()
}

/// D'Agostino-Pearson K² omnibus test. The statistic is χ² with two degrees
/// of freedom, so the p-value is `exp(-k2 / 2)`.
pub fn normaltest(values: &[f64]) -> NormalityOutcome {
    let count = values.len();
    if count < MIN_NORMALITY_SAMPLE {
        return NormalityOutcome::InsufficientData { count };
    }

    let n = count as f64;
    let mean = values.iter().sum::<f64>() / n;
    let moment = |k: i32| values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / n;
    let m2 = moment(2);
    if m2 == 0.0 {
        return NormalityOutcome::Constant;
    }

    let skewness = moment(3) / m2.powf(1.5);
    let kurtosis = moment(4) / (m2 * m2);

    let statistic = skew_z(skewness, n).powi(2) + kurtosis_z(kurtosis, n).powi(2);
    let p_value = (-statistic / 2.0).exp();
    NormalityOutcome::Tested {
        statistic,
        p_value,
        looks_normal: p_value > NORMALITY_ALPHA,
    }
}

fn skew_z(b2: f64, n: f64) -> f64 {
    let y = b2 * (((n + 1.0) * (n + 3.0)) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

fn kurtosis_z(b2: f64, n: f64) -> f64 {
    let expected = 3.0 * (n - 1.0) / (n + 1.0);
    let variance = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - expected) / variance.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * ((6.0 * (n + 3.0) * (n + 5.0)) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / sqrt_beta1.powi(2)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}
