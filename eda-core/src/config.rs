//! Runtime configuration and per-analysis options.

use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use tracing::debug;

use crate::narrative::PromptKind;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default language model.
pub const DEFAULT_MODEL: &str = "llama3.2";
/// Default Google Sheets API endpoint.
pub const DEFAULT_SHEETS_API: &str = "https://sheets.googleapis.com";
/// Default z-score threshold for outlier detection.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;

const CONFIG_DIR_NAME: &str = ".eda";

/// Process-level configuration: where credentials and prompts live and how
/// to reach the remote collaborators.
#[derive(Debug, Clone)]
pub struct EdaConfig {
    /// Directory holding `client_secrets.json`, `token.json` and `prompts/`
    pub config_dir: PathBuf,
    /// Base URL of the Ollama server
    pub ollama_base_url: String,
    /// Model used when the caller does not name one
    pub default_model: String,
    /// Bound applied to every outbound HTTP request
    pub request_timeout: Duration,
    /// Base URL of the Google Sheets API
    pub sheets_api_base: String,
}

impl Default for EdaConfig {
    fn default() -> Self {
        let config_dir = BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(CONFIG_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME));
        Self {
            config_dir,
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            sheets_api_base: DEFAULT_SHEETS_API.to_string(),
        }
    }
}

impl EdaConfig {
    /// Builds the default configuration and applies environment overrides:
    /// `EDA_CONFIG_DIR`, `OLLAMA_HOST`, `EDA_MODEL`, `EDA_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("EDA_CONFIG_DIR") {
            config.config_dir = PathBuf::from(dir);
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.ollama_base_url = normalize_host(&host);
        }
        if let Ok(model) = std::env::var("EDA_MODEL") {
            if !model.trim().is_empty() {
                config.default_model = model;
            }
        }
        if let Some(secs) = std::env::var("EDA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        debug!(config_dir = %config.config_dir.display(), ollama = %config.ollama_base_url, "Loaded configuration");
        config
    }

    /// Sets the configuration directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Sets the Ollama base URL.
    pub fn with_ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_base_url = url.into();
        self
    }

    /// Sets the Google Sheets API base URL.
    pub fn with_sheets_api_base(mut self, url: impl Into<String>) -> Self {
        self.sheets_api_base = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Path of the OAuth client secrets file.
    pub fn client_secrets_path(&self) -> PathBuf {
        self.config_dir.join("client_secrets.json")
    }

    /// Path of the cached OAuth token.
    pub fn token_path(&self) -> PathBuf {
        self.config_dir.join("token.json")
    }

    /// Directory searched for user prompt templates.
    pub fn prompts_dir(&self) -> PathBuf {
        self.config_dir.join("prompts")
    }
}

/// `OLLAMA_HOST` may be given without a scheme (`127.0.0.1:11434`).
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Options for a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Compute the correlation matrix, normality tests and outliers
    pub advanced: bool,
    /// Absolute z-score above which a value is an outlier
    pub outlier_threshold: f64,
    /// Render and open the chart dashboard
    pub visualize: bool,
    /// Ask the language model for a narrative
    pub narrative: bool,
    /// Model name passed to the narrative client
    pub model: String,
    /// Prompt variant override; auto-detected when `None`
    pub prompt_kind: Option<PromptKind>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            advanced: false,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            visualize: false,
            narrative: false,
            model: DEFAULT_MODEL.to_string(),
            prompt_kind: None,
        }
    }
}

impl AnalysisOptions {
    /// Creates default options (base report only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the advanced statistics stage.
    pub fn with_advanced(mut self, enabled: bool) -> Self {
        self.advanced = enabled;
        self
    }

    /// Sets the outlier z-score threshold.
    pub fn with_outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = threshold;
        self
    }

    /// Enables or disables the visualization stage.
    pub fn with_visualization(mut self, enabled: bool) -> Self {
        self.visualize = enabled;
        self
    }

    /// Enables or disables the narrative stage.
    pub fn with_narrative(mut self, enabled: bool) -> Self {
        self.narrative = enabled;
        self
    }

    /// Sets the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Forces a prompt variant.
    pub fn with_prompt_kind(mut self, kind: Option<PromptKind>) -> Self {
        self.prompt_kind = kind;
        self
    }
}
