//! Runtime configuration for the generation pipeline and its collaborators.
//!
//! Values start from [`GenerationConfig::default`], are overridden by
//! environment variables (a `.env` file is loaded first), and may be
//! overridden again by the CLI before being handed to constructors.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::api_connection::endpoints::{DEFAULT_MODEL, OPENROUTER_BASE_URL};

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

const MODEL_ENV_VAR: &str = "RECIPE_GEN_MODEL";
const TEMPERATURE_ENV_VAR: &str = "RECIPE_GEN_TEMPERATURE";
const MAX_RETRIES_ENV_VAR: &str = "RECIPE_GEN_MAX_RETRIES";
const TIMEOUT_ENV_VAR: &str = "RECIPE_GEN_TIMEOUT_SECS";
const BASE_URL_ENV_VAR: &str = "OPENROUTER_BASE_URL";
const FIELD_NAMING_ENV_VAR: &str = "RECIPE_GEN_FIELD_NAMING";
const WEB_RESULTS_ENV_VAR: &str = "RECIPE_GEN_WEB_RESULTS";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which set of field names is advertised to the model in the recipe schema.
///
/// The validator accepts both sets regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldNaming {
    #[default]
    Canonical,
    Localized,
}

impl FromStr for FieldNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "canonical" => Ok(FieldNaming::Canonical),
            "localized" => Ok(FieldNaming::Localized),
            other => Err(format!("expected 'canonical' or 'localized', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model_name: String,
    /// 0.0 is deterministic; values around 1.5 and above are very creative.
    pub temperature: f32,
    /// Extra attempts the service client makes after a transient failure.
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub retry_base_delay: Duration,
    pub max_tokens: u32,
    pub api_key_env_var: String,
    pub base_url: String,
    pub field_naming: FieldNaming,
    pub web_max_results: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_retries: 2,
            request_timeout: Duration::from_secs(60),
            retry_base_delay: Duration::from_millis(500),
            max_tokens: 2048,
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            field_naming: FieldNaming::Canonical,
            web_max_results: 3,
        }
    }
}

impl GenerationConfig {
    /// Defaults overridden by whatever the process environment sets.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, so callers and tests
    /// don't have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(model) = lookup(MODEL_ENV_VAR).filter(|m| !m.trim().is_empty()) {
            config.model_name = model.trim().to_string();
        }
        if let Some(temperature) = parse_var::<f32>(&lookup, TEMPERATURE_ENV_VAR)? {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidValue {
                    var: TEMPERATURE_ENV_VAR,
                    value: temperature.to_string(),
                    reason: "temperature must be between 0.0 and 2.0".to_string(),
                });
            }
            config.temperature = temperature;
        }
        if let Some(retries) = parse_var::<u32>(&lookup, MAX_RETRIES_ENV_VAR)? {
            config.max_retries = retries;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, TIMEOUT_ENV_VAR)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = lookup(BASE_URL_ENV_VAR).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(naming) = parse_var::<FieldNaming>(&lookup, FIELD_NAMING_ENV_VAR)? {
            config.field_naming = naming;
        }
        if let Some(results) = parse_var::<usize>(&lookup, WEB_RESULTS_ENV_VAR)? {
            config.web_max_results = results;
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
