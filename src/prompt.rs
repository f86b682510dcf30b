//! Prompt templates and their assembly into a single instruction string.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::config::FieldNaming;

pub const INGREDIENTS_PLACEHOLDER: &str = "{{ingredients}}";
pub const WEB_RESULTS_PLACEHOLDER: &str = "{{web_results}}";

/// Appended to every assembled prompt.
pub const JSON_ONLY_SUFFIX: &str = "\n\nPlease respond only with valid JSON.";

/// Default recipe templates, embedded at compile time. Each one asks for the
/// field names of its [`FieldNaming`].
pub const BUILTIN_RECIPE_TEMPLATE: &str = include_str!("prompts/recipe.txt");
pub const BUILTIN_RECIPE_TEMPLATE_PT: &str = include_str!("prompts/recipe_pt.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The built-in template whose field names match `naming`.
    pub fn builtin(naming: FieldNaming) -> Self {
        match naming {
            FieldNaming::Canonical => Self::new(BUILTIN_RECIPE_TEMPLATE),
            FieldNaming::Localized => Self::new(BUILTIN_RECIPE_TEMPLATE_PT),
        }
    }

    /// Reads a UTF-8 template file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template '{}'", path.display()))?;
        Ok(Self::new(text))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn uses_web_results(&self) -> bool {
        self.text.contains(WEB_RESULTS_PLACEHOLDER)
    }
}

/// Substitutes the placeholders literally and appends [`JSON_ONLY_SUFFIX`].
///
/// `{{web_results}}` is only replaced when `web_results` is given; any
/// placeholder without a value stays in the text as-is.
pub fn assemble_prompt(template: &str, ingredients: &str, web_results: Option<&str>) -> String {
    let mut prompt = template.replace(INGREDIENTS_PLACEHOLDER, ingredients);
    if let Some(results) = web_results {
        prompt = prompt.replace(WEB_RESULTS_PLACEHOLDER, results);
    }
    prompt.push_str(JSON_ONLY_SUFFIX);
    prompt
}
