//! Argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eda_core::config::DEFAULT_OUTLIER_THRESHOLD;

#[derive(Parser, Debug)]
#[command(name = "eda", author, version)]
#[command(about = "EDA - Command line tool for exploratory data analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a data file and generate summary statistics
    #[command(after_help = ANALYZE_EXAMPLES)]
    Analyze(AnalyzeArgs),

    /// List the tabs of a spreadsheet or workbook
    Sheets {
        /// Workbook path or Google Sheets id (prefix with 'gs://')
        source: String,
    },

    /// Manage Google Sheets authentication
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

const ANALYZE_EXAMPLES: &str = "\
SOURCE can be a .csv, .tsv, .xlsx, .parquet or .json file, or a Google
Sheets id prefixed with 'gs://'.

Examples:
  eda analyze data.csv
  eda analyze data.csv --llm --viz
  eda analyze data.csv --llm --prompt timeseries
  eda analyze gs://1234567890abcdef --llm --model codellama --viz";

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Data file or Google Sheets id
    pub source: String,

    /// Sheet index (for workbooks and Google Sheets)
    #[arg(short, long)]
    pub sheet: Option<usize>,

    /// Output file for the analysis
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include LLM-based analysis using Ollama
    #[arg(long)]
    pub llm: bool,

    /// Ollama model to use (default: llama3.2, or EDA_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Generate interactive visualizations
    #[arg(long)]
    pub viz: bool,

    /// Prompt template to use (default: auto-detect)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Include correlation, normality tests and outliers
    #[arg(long)]
    pub advanced: bool,

    /// Absolute z-score above which a value is an outlier
    #[arg(long, default_value_t = DEFAULT_OUTLIER_THRESHOLD)]
    pub outlier_threshold: f64,

    /// Report format
    #[arg(long, value_enum, default_value = "human")]
    pub format: ReportFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Install an OAuth client secrets file
    #[command(after_help = SETUP_HELP)]
    Setup {
        /// Path to client_secrets.json
        client_secrets: PathBuf,
    },
    /// Run the browser consent flow and cache the token
    Login,
    /// Show the cached token
    Status,
}

const SETUP_HELP: &str = "\
Get your client_secrets.json file from Google Cloud Console:
  1. Go to https://console.cloud.google.com
  2. Create a project or select existing project
  3. Enable Google Sheets API
  4. Go to Credentials
  5. Create OAuth 2.0 Client ID (Desktop application)
  6. Download the client secrets file";
