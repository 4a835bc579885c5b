//! Sub-command handlers.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use dialoguer::Select;
use eda_core::analysis::{AnalysisOrchestrator, AnalysisReport};
use eda_core::auth::{ClientSecrets, Credential, GoogleTokenProvider};
use eda_core::config::{AnalysisOptions, EdaConfig};
use eda_core::formatters::{HumanFormatter, JsonFormatter, ReportFormatter};
use eda_core::narrative::PromptKind;
use eda_core::sources::{DataReader, ReaderFactory, SheetInfo, SHEETS_SCHEME};
use tracing::{debug, info};

use crate::cli::{AnalyzeArgs, ReportFormat};
use crate::markdown::MarkdownRenderer;

pub async fn analyze(config: &EdaConfig, args: AnalyzeArgs, use_colors: bool) -> Result<()> {
    let orchestrator = AnalysisOrchestrator::builder(config.clone()).build();

    let sheet = match args.sheet {
        Some(index) => index,
        None if args.source.starts_with(SHEETS_SCHEME) => {
            select_sheet(orchestrator.factory(), &args.source).await?
        }
        None => 0,
    };

    let options = AnalysisOptions::new()
        .with_advanced(args.advanced)
        .with_outlier_threshold(args.outlier_threshold)
        .with_visualization(args.viz)
        .with_narrative(args.llm)
        .with_model(args.model.unwrap_or_else(|| config.default_model.clone()))
        .with_prompt_kind(args.prompt.as_deref().map(PromptKind::from_name));

    let report = match orchestrator.run(&args.source, sheet, &options).await {
        Ok(report) => report,
        Err(e) => bail!("Error analyzing file: {e}"),
    };

    let to_terminal = args.output.is_none();
    let rendered = render(&report, args.format, use_colors && to_terminal)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote analysis");
            eprintln!("Analysis written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// The report text followed by the narrative. Markdown is rendered only for
/// the terminal; files get the raw narrative.
fn render(report: &AnalysisReport, format: ReportFormat, use_colors: bool) -> Result<String> {
    if format == ReportFormat::Json {
        return Ok(JsonFormatter::new().format(report)?);
    }

    let mut text = HumanFormatter::new().with_colors(use_colors).format(report)?;
    if let Some(narrative) = report.narrative_text() {
        text.push('\n');
        if use_colors {
            text.push_str(&MarkdownRenderer::new(true).render(narrative));
        } else {
            text.push_str(narrative.trim());
        }
    }
    Ok(text)
}

pub async fn sheets(config: &EdaConfig, source: &str) -> Result<()> {
    let factory = ReaderFactory::new(config.clone());
    let sheets = list_sheets(&factory, source).await?;
    println!("Available sheets:");
    for sheet in &sheets {
        println!("{}: {}", sheet.index, sheet.title);
    }
    Ok(())
}

async fn list_sheets(factory: &ReaderFactory, source: &str) -> Result<Vec<SheetInfo>> {
    let reader = factory.select_reader(source)?;
    let sheets = reader.list_sheets(source).await?;
    debug!(source, count = sheets.len(), "Listed sheets");
    Ok(sheets)
}

/// Asks which tab of a spreadsheet to analyze.
async fn select_sheet(factory: &ReaderFactory, source: &str) -> Result<usize> {
    let sheets = list_sheets(factory, source).await?;
    if sheets.is_empty() {
        bail!("{source} has no sheets");
    }
    if sheets.len() == 1 {
        return Ok(0);
    }

    let titles: Vec<String> = sheets
        .iter()
        .map(|s| format!("{}: {}", s.index, s.title))
        .collect();
    let selected = Select::new()
        .with_prompt("Select sheet")
        .items(&titles)
        .default(0)
        .interact()
        .context("sheet selection needs an interactive terminal; pass --sheet")?;

    eprintln!("Selected sheet: {}", sheets[selected].title.bold());
    Ok(selected)
}

pub fn auth_setup(config: &EdaConfig, client_secrets: &Path) -> Result<()> {
    ClientSecrets::from_file(client_secrets)?;
    fs::create_dir_all(&config.config_dir)
        .with_context(|| format!("failed to create {}", config.config_dir.display()))?;
    let target = config.client_secrets_path();
    fs::copy(client_secrets, &target).with_context(|| {
        format!(
            "failed to copy {} to {}",
            client_secrets.display(),
            target.display()
        )
    })?;
    info!(path = %target.display(), "Installed client secrets");
    println!(
        "Authentication setup complete. You'll be prompted to authenticate in your browser when needed."
    );
    Ok(())
}

pub async fn auth_login(config: &EdaConfig) -> Result<()> {
    let provider = GoogleTokenProvider::new(config)?;
    let credential = provider.login().await?;
    println!("{}", "Authenticated with Google Sheets.".green());
    println!("{}", describe_credential(&credential));
    println!("Token cached at {}", config.token_path().display());
    Ok(())
}

pub fn auth_status(config: &EdaConfig) -> Result<()> {
    let provider = GoogleTokenProvider::new(config)?;
    match provider.status()? {
        Some(credential) => println!("{}", describe_credential(&credential)),
        None if config.client_secrets_path().exists() => {
            println!("Not authenticated. Run `eda auth login` to sign in.")
        }
        None => println!("Not configured. Run `eda auth setup <client_secrets.json>` first."),
    }
    Ok(())
}

fn describe_credential(credential: &Credential) -> String {
    let state = if credential.is_valid() {
        "valid".green()
    } else if credential.can_refresh() {
        "expired (will refresh on next use)".yellow()
    } else {
        "expired".red()
    };
    let mut lines = vec![format!("Token: {state}")];
    if let Some(expiry) = credential.expires_at {
        lines.push(format!("Expires: {}", expiry.to_rfc3339()));
    }
    lines.push(format!(
        "Refresh token: {}",
        if credential.can_refresh() { "yes" } else { "no" }
    ));
    if !credential.scopes.is_empty() {
        lines.push(format!("Scopes: {}", credential.scopes.join(" ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use eda_core::analysis::{DatasetOverview, NarrativeSection, StageOutcome};
    use tempfile::TempDir;

    fn report() -> AnalysisReport {
        AnalysisReport {
            source: "data.csv".into(),
            overview: DatasetOverview {
                name: "data".into(),
                rows: 3,
                columns: 0,
            },
            columns: Vec::new(),
            summary: Vec::new(),
            advanced: None,
            visualization: None,
            narrative: Some(NarrativeSection {
                prompt: PromptKind::Numeric,
                model: "llama3.2".into(),
                outcome: StageOutcome::Completed("## Findings\n\n- **A** is clean\n".into()),
            }),
        }
    }

    #[test]
    fn test_plain_render_appends_raw_narrative() {
        let text = render(&report(), ReportFormat::Human, false).unwrap();
        assert!(text.contains("Shape: (3, 0)"));
        assert!(text.contains("LLM Analysis (using prompt: 'numeric')"));
        assert!(text.ends_with("## Findings\n\n- **A** is clean"));
    }

    #[test]
    fn test_json_render() {
        let text = render(&report(), ReportFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["overview"]["rows"], 3);
        assert_eq!(value["narrative"]["prompt"], "numeric");
    }

    #[test]
    fn test_auth_setup_copies_secrets() {
        let dir = TempDir::new().unwrap();
        let secrets = dir.path().join("downloaded.json");
        fs::write(
            &secrets,
            r#"{"installed":{"client_id":"id","client_secret":"s","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token"}}"#,
        )
        .unwrap();
        let config = EdaConfig::default().with_config_dir(dir.path().join("eda"));

        auth_setup(&config, &secrets).unwrap();

        assert_eq!(
            fs::read_to_string(config.client_secrets_path()).unwrap(),
            fs::read_to_string(&secrets).unwrap()
        );
    }

    #[test]
    fn test_auth_setup_rejects_invalid_secrets() {
        let dir = TempDir::new().unwrap();
        let secrets = dir.path().join("bad.json");
        fs::write(&secrets, "{}").unwrap();
        let config = EdaConfig::default().with_config_dir(dir.path().join("eda"));

        assert!(auth_setup(&config, &secrets).is_err());
        assert!(!config.client_secrets_path().exists());
    }
}
