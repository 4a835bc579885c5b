//! Language-model narration of an analysis.
//!
//! A [`PromptLibrary`] supplies the template for a [`PromptKind`], the
//! orchestrator fills in the table's shape, column kinds and summary
//! statistics, and a [`NarrativeClient`] turns the prompt into Markdown.

mod ollama;
mod prompts;

use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prelude::*;

pub use self::ollama::OllamaClient;
pub use self::prompts::{PromptContext, PromptLibrary};

/// Prompt template variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    #[default]
    Default,
    Numeric,
    Categorical,
    Timeseries,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::Default,
        PromptKind::Numeric,
        PromptKind::Categorical,
        PromptKind::Timeseries,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Default => "default",
            PromptKind::Numeric => "numeric",
            PromptKind::Categorical => "categorical",
            PromptKind::Timeseries => "timeseries",
        }
    }

    /// Parses a user-supplied name, falling back to `Default` for unknown
    /// names.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(prompt = name, "Unknown prompt template, using default");
            PromptKind::Default
        })
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptKind {
    type Err = EdaError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        PromptKind::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| EdaError::Configuration(format!("unknown prompt kind '{s}'")))
    }
}

/// Generates text from a prompt.
#[async_trait]
pub trait NarrativeClient: Debug + Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}
