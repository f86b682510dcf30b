//! Two-phase recipe generation.
//!
//! The primary phase asks the service for schema-constrained output and
//! decodes it strictly. If anything goes wrong, the fallback phase asks once
//! more for free text and recovers a JSON object from it. There are no
//! further attempts; transport retries happen inside the service client.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::JsonSchemaDefinition;
use crate::config::{FieldNaming, GenerationConfig};
use crate::prompt::assemble_prompt;
use crate::recipe_schema::{
    recipe_json_schema, validate_recipe, validate_recipe_value, Recipe, SchemaViolation,
};
use crate::response_extractor::extract_json;
use crate::safety::{ClassificationFailure, SafetyClassifier};
use crate::search::{WebSearch, NO_RESULTS};

/// Text returned by the generation service, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub content: String,
}

/// A hosted text-generation model.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// With `schema`, the service is asked for output conforming to it; it
    /// may still not conform. Without it, the output is free text.
    async fn invoke(
        &self,
        prompt: &str,
        schema: Option<&JsonSchemaDefinition>,
    ) -> Result<RawResponse, ApiConnectionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primary,
    Fallback,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Primary => write!(f, "primary"),
            Phase::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("generation service error: {0}")]
    Transport(#[source] ApiConnectionError),
    #[error("structured output is not valid JSON: {0}")]
    Decoding(#[source] serde_json::Error),
    #[error("schema validation failed: {0}")]
    Schema(#[source] SchemaViolation),
    #[error("no JSON found in model output")]
    NoJsonFound,
}

#[derive(Debug, Error)]
#[error("{phase} phase: {cause}")]
pub struct PhaseFailure {
    pub phase: Phase,
    #[source]
    pub cause: FailureCause,
}

/// Terminal failure with the causes of both phases, in order.
#[derive(Debug, Error)]
pub struct GenerationFailure {
    pub causes: Vec<PhaseFailure>,
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recipe generation failed")?;
        for (i, failure) in self.causes.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{failure}")?;
        }
        Ok(())
    }
}

impl GenerationFailure {
    /// The cause that ended the request.
    pub fn final_cause(&self) -> Option<&FailureCause> {
        self.causes.last().map(|failure| &failure.cause)
    }

    /// The validator's verdict, when the request ended on one.
    pub fn schema_violation(&self) -> Option<&SchemaViolation> {
        match self.final_cause() {
            Some(FailureCause::Schema(violation)) => Some(violation),
            _ => None,
        }
    }
}

pub struct RecipeGenerator {
    service: Arc<dyn GenerationService>,
    search: Option<Arc<dyn WebSearch>>,
    field_naming: FieldNaming,
    web_max_results: usize,
}

impl RecipeGenerator {
    pub fn new(service: Arc<dyn GenerationService>, config: &GenerationConfig) -> Self {
        Self {
            service,
            search: None,
            field_naming: config.field_naming,
            web_max_results: config.web_max_results,
        }
    }

    pub fn with_web_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Search results for the ingredients, or the no-results sentinel when
    /// search is unavailable or fails.
    async fn web_context(&self, ingredients: &str) -> String {
        let Some(search) = &self.search else {
            warn!("web search requested but no search client is configured");
            return NO_RESULTS.to_string();
        };

        let query = format!("recipes with {ingredients}");
        match search.search(&query, self.web_max_results).await {
            Ok(results) => results,
            Err(e) => {
                warn!("web search failed, continuing without it: {e}");
                NO_RESULTS.to_string()
            }
        }
    }

    pub async fn build_prompt(&self, ingredients: &str, template: &str, use_web: bool) -> String {
        let web_results = if use_web {
            Some(self.web_context(ingredients).await)
        } else {
            None
        };
        assemble_prompt(template, ingredients, web_results.as_deref())
    }

    pub async fn generate_recipe(
        &self,
        ingredients: &str,
        template: &str,
        use_web: bool,
    ) -> Result<Recipe, GenerationFailure> {
        let prompt = self.build_prompt(ingredients, template, use_web).await;

        let primary_cause = match self.primary(&prompt).await {
            Ok(recipe) => {
                info!(phase = %Phase::Primary, "recipe generated");
                return Ok(recipe);
            }
            Err(cause) => {
                warn!(phase = %Phase::Primary, "structured generation failed, falling back: {cause}");
                cause
            }
        };

        match self.fallback(&prompt).await {
            Ok(recipe) => {
                info!(phase = %Phase::Fallback, "recipe recovered from free-text output");
                Ok(recipe)
            }
            Err(fallback_cause) => {
                warn!(phase = %Phase::Fallback, "fallback generation failed: {fallback_cause}");
                Err(GenerationFailure {
                    causes: vec![
                        PhaseFailure {
                            phase: Phase::Primary,
                            cause: primary_cause,
                        },
                        PhaseFailure {
                            phase: Phase::Fallback,
                            cause: fallback_cause,
                        },
                    ],
                })
            }
        }
    }

    async fn primary(&self, prompt: &str) -> Result<Recipe, FailureCause> {
        let schema = recipe_json_schema(self.field_naming);
        let raw = self
            .service
            .invoke(prompt, Some(&schema))
            .await
            .map_err(FailureCause::Transport)?;
        let decoded: serde_json::Value =
            serde_json::from_str(raw.content.trim()).map_err(FailureCause::Decoding)?;
        validate_recipe_value(&decoded).map_err(FailureCause::Schema)
    }

    async fn fallback(&self, prompt: &str) -> Result<Recipe, FailureCause> {
        let raw = self
            .service
            .invoke(prompt, None)
            .await
            .map_err(FailureCause::Transport)?;
        let extracted = extract_json(&raw.content).ok_or(FailureCause::NoJsonFound)?;
        validate_recipe(&extracted).map_err(FailureCause::Schema)
    }

    /// Runs the safety pre-check against the same generation service.
    pub async fn check_injection(&self, ingredients: &[String]) -> Result<bool, ClassificationFailure> {
        SafetyClassifier::new(Arc::clone(&self.service), self.field_naming)
            .is_adversarial(ingredients)
            .await
    }
}
