//! The analysis pipeline.
//!
//! [`AnalysisOrchestrator`] resolves a reader, loads the [`Table`], computes
//! the base report and then runs each requested optional stage. Selecting
//! the reader, reading the source and the base statistics must succeed; the
//! optional stages (advanced statistics, visualization, narrative) record
//! their failures as [`StageOutcome::Failed`] and leave the rest of the
//! report intact.

mod advanced;
mod describe;
mod detect;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};

pub use self::advanced::{
    advanced_stats, correlation_matrix, normaltest, zscore_outliers, AdvancedStats,
    ColumnOutliers, CorrelationMatrix, NormalityOutcome, NormalityTest, MIN_NORMALITY_SAMPLE,
    NORMALITY_ALPHA,
};
pub use self::describe::{
    quantile, CategoricalSummary, ColumnDescription, ColumnSummary, NumericSummary, StatsContext,
    DATASET_TABLE,
};
pub use self::detect::detect_data_type;
pub use self::report::{
    AnalysisReport, ColumnInfo, DatasetOverview, NarrativeSection, StageOutcome,
};

use crate::formatters::{column_kinds_block, describe_block, HumanFormatter, ReportFormatter};
use crate::narrative::{NarrativeClient, OllamaClient, PromptContext, PromptKind, PromptLibrary};
use crate::prelude::*;
use crate::sources::{DataReader, ReaderFactory};
use crate::viz::{present, PlotlyDashboard, SystemViewer, Viewer, Visualizer};

/// Builder for [`AnalysisOrchestrator`].
#[derive(Debug)]
pub struct AnalysisOrchestratorBuilder {
    config: EdaConfig,
    factory: Option<ReaderFactory>,
    prompts: Option<PromptLibrary>,
    narrative: Option<Arc<dyn NarrativeClient>>,
    visualizer: Option<Arc<dyn Visualizer>>,
    viewer: Option<Arc<dyn Viewer>>,
}

impl AnalysisOrchestratorBuilder {
    /// Sets the reader factory.
    pub fn factory(mut self, factory: ReaderFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the prompt library.
    pub fn prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Sets the narrative client. Defaults to Ollama at the configured URL.
    pub fn narrative(mut self, client: Arc<dyn NarrativeClient>) -> Self {
        self.narrative = Some(client);
        self
    }

    /// Sets the dashboard renderer.
    pub fn visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    /// Sets what opens the staged dashboard.
    pub fn viewer(mut self, viewer: Arc<dyn Viewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn build(self) -> AnalysisOrchestrator {
        let config = self.config;
        AnalysisOrchestrator {
            factory: self
                .factory
                .unwrap_or_else(|| ReaderFactory::new(config.clone())),
            prompts: self
                .prompts
                .unwrap_or_else(|| PromptLibrary::new(config.prompts_dir())),
            narrative: self.narrative,
            visualizer: self
                .visualizer
                .unwrap_or_else(|| Arc::new(PlotlyDashboard::new())),
            viewer: self.viewer.unwrap_or_else(|| Arc::new(SystemViewer)),
            config,
        }
    }
}

/// Runs an analysis from a source identifier to a report.
///
/// # Examples
///
/// ```rust,no_run
/// use eda_core::analysis::AnalysisOrchestrator;
/// use eda_core::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let orchestrator = AnalysisOrchestrator::builder(EdaConfig::default()).build();
/// let report = orchestrator
///     .run("data/users.csv", 0, &AnalysisOptions::new().with_advanced(true))
///     .await?;
/// assert_eq!(report.overview.shape().1, report.columns.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AnalysisOrchestrator {
    config: EdaConfig,
    factory: ReaderFactory,
    prompts: PromptLibrary,
    narrative: Option<Arc<dyn NarrativeClient>>,
    visualizer: Arc<dyn Visualizer>,
    viewer: Arc<dyn Viewer>,
}

impl AnalysisOrchestrator {
    pub fn builder(config: EdaConfig) -> AnalysisOrchestratorBuilder {
        AnalysisOrchestratorBuilder {
            config,
            factory: None,
            prompts: None,
            narrative: None,
            visualizer: None,
            viewer: None,
        }
    }

    pub fn factory(&self) -> &ReaderFactory {
        &self.factory
    }

    /// Runs the pipeline and returns the typed report.
    #[instrument(skip(self, options), fields(
        advanced = options.advanced,
        visualize = options.visualize,
        narrative = options.narrative,
    ))]
    pub async fn run(
        &self,
        source: &str,
        sheet_index: usize,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport> {
        let reader = self.factory.select_reader(source)?;
        info!(reader = %reader.description(), "Loading source");
        let table = reader.read_data(source, sheet_index).await?;
        let (rows, columns) = table.shape();
        info!(rows, columns, "Loaded table");

        let stats = StatsContext::new(&table)?;
        let summary = stats.describe(&table).await?;

        let mut report = AnalysisReport {
            source: source.to_string(),
            overview: DatasetOverview {
                name: table.name().to_string(),
                rows,
                columns,
            },
            columns: ColumnInfo::from_table(&table),
            summary,
            advanced: None,
            visualization: None,
            narrative: None,
        };

        if options.advanced {
            let result = advanced_stats(&stats, &table, options.outlier_threshold).await;
            report.advanced = Some(stage("advanced statistics", result));
        }

        if options.visualize {
            let result = self.visualize(&stats, &table, report.advanced.as_ref()).await;
            report.visualization = Some(stage("visualization", result));
        }

        if options.narrative {
            let prompt = options
                .prompt_kind
                .unwrap_or_else(|| detect_data_type(&table));
            let result = self.narrate(&report, prompt, &options.model).await;
            report.narrative = Some(NarrativeSection {
                prompt,
                model: options.model.clone(),
                outcome: stage("narrative", result),
            });
        }

        Ok(report)
    }

    /// Runs the pipeline and renders it as plain text.
    ///
    /// Returns the report text and the narrative, if one was produced. A
    /// failure to select the reader, read the source or compute the base
    /// statistics yields the single line `Error analyzing file: <error>`.
    pub async fn analyze(
        &self,
        source: &str,
        sheet_index: usize,
        options: &AnalysisOptions,
    ) -> (String, Option<String>) {
        let rendered = match self.run(source, sheet_index, options).await {
            Ok(report) => HumanFormatter::plain()
                .format(&report)
                .map(|text| (text, report.narrative_text().map(str::to_string))),
            Err(e) => Err(e),
        };
        rendered.unwrap_or_else(|e| (format!("Error analyzing file: {e}"), None))
    }

    /// Renders and presents the dashboard, reusing the correlation matrix of
    /// a completed advanced stage.
    async fn visualize(
        &self,
        stats: &StatsContext,
        table: &Table,
        advanced: Option<&StageOutcome<AdvancedStats>>,
    ) -> Result<PathBuf> {
        let correlation = match advanced {
            Some(StageOutcome::Completed(advanced)) => advanced.correlation.clone(),
            _ => correlation_matrix(stats, &table.numeric_columns()).await?,
        };
        let artifact = self.visualizer.render(table, correlation.as_ref())?;
        present(&artifact, self.viewer.as_ref())
    }

    async fn narrate(
        &self,
        report: &AnalysisReport,
        prompt: PromptKind,
        model: &str,
    ) -> Result<String> {
        let context = PromptContext {
            rows: report.overview.rows,
            columns: report.overview.columns,
            dtypes: column_kinds_block(&report.columns),
            stats: describe_block(&report.summary),
        };
        let text = self.prompts.render(prompt, &context)?;

        let client: Arc<dyn NarrativeClient> = match &self.narrative {
            Some(client) => client.clone(),
            None => Arc::new(OllamaClient::new(&self.config)?),
        };
        info!(%prompt, model, "Requesting narrative");
        client.generate(model, &text).await
    }
}

fn stage<T>(name: &str, result: Result<T>) -> StageOutcome<T> {
    if let Err(e) = &result {
        warn!(stage = name, error = %e, "Optional stage failed");
    }
    StageOutcome::from_result(name, result)
}
