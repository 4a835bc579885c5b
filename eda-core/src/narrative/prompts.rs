//! Prompt templates.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, instrument};

use super::PromptKind;
use crate::prelude::*;

const BUILTIN_DEFAULT: &str = include_str!("../../prompts/default.yaml");
const BUILTIN_NUMERIC: &str = include_str!("../../prompts/numeric.yaml");
const BUILTIN_CATEGORICAL: &str = include_str!("../../prompts/categorical.yaml");
const BUILTIN_TIMESERIES: &str = include_str!("../../prompts/timeseries.yaml");

#[derive(Debug, Deserialize)]
struct TemplateFile {
    template: String,
}

/// Values substituted into a template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptContext {
    pub rows: usize,
    pub columns: usize,
    pub dtypes: String,
    pub stats: String,
}

/// Loads prompt templates from a directory, falling back to the templates
/// compiled into the crate.
///
/// A template is a YAML document with a `template` key. The placeholders
/// `{rows}`, `{columns}`, `{dtypes}` and `{stats}` are replaced by
/// [`PromptLibrary::render`].
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// A library that looks for `<dir>/<kind>.yaml` before the built-ins.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A library with only the built-in templates.
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    /// The template text for `kind`.
    #[instrument(skip(self))]
    pub fn load(&self, kind: PromptKind) -> Result<String> {
        if let Some(dir) = &self.dir {
            for candidate in [kind, PromptKind::Default] {
                let path = dir.join(format!("{}.yaml", candidate.name()));
                if path.is_file() {
                    debug!(path = %path.display(), "Loading prompt template");
                    return parse_template(&std::fs::read_to_string(&path)?, &path);
                }
            }
        }
        parse_template(builtin(kind), Path::new("<builtin>"))
    }

    /// Loads the template for `kind` and fills in `context`.
    pub fn render(&self, kind: PromptKind, context: &PromptContext) -> Result<String> {
        Ok(self
            .load(kind)?
            .replace("{rows}", &context.rows.to_string())
            .replace("{columns}", &context.columns.to_string())
            .replace("{dtypes}", &context.dtypes)
            .replace("{stats}", &context.stats))
    }
}

fn builtin(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Default => BUILTIN_DEFAULT,
        PromptKind::Numeric => BUILTIN_NUMERIC,
        PromptKind::Categorical => BUILTIN_CATEGORICAL,
        PromptKind::Timeseries => BUILTIN_TIMESERIES,
    }
}

fn parse_template(content: &str, origin: &Path) -> Result<String> {
    let file: TemplateFile = serde_yaml::from_str(content).map_err(|e| {
        EdaError::Configuration(format!("invalid prompt template {}: {e}", origin.display()))
    })?;
    Ok(file.template)
}
