use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::{Client, StatusCode};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, JsonSchemaDefinition,
    ResponseFormat,
};
use crate::config::GenerationConfig;
use crate::generation::{GenerationService, RawResponse};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError { status: StatusCode, error_body: String },
    #[error("API returned no completion content")]
    EmptyResponse,
}

impl ApiConnectionError {
    /// Network failures, rate limiting, server-side errors and malformed or
    /// empty completion envelopes are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiConnectionError::NetworkError(_)
            | ApiConnectionError::SerializationError(_)
            | ApiConnectionError::EmptyResponse => true,
            ApiConnectionError::ApiError { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Chat-completion client for OpenRouter's OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: Client,
    api_key_env_var: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, ApiConnectionError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            api_key_env_var: config.api_key_env_var.clone(),
            api_key: None,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
        })
    }

    /// Uses `api_key` directly instead of reading the configured env var.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn resolve_api_key(&self) -> Result<String, ApiConnectionError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        dotenv().ok();
        env::var(&self.api_key_env_var)
            .map_err(|_| ApiConnectionError::MissingApiKey(self.api_key_env_var.clone()))
    }

    pub fn build_request(
        &self,
        prompt: &str,
        schema: Option<&JsonSchemaDefinition>,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            response_format: schema.cloned().map(ResponseFormat::json_schema),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }

    /// Performs a single request with no retry.
    pub async fn call_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        let api_key = self.resolve_api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        let site_url =
            env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "RecipeGen".to_string());

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", site_url)
            .header("X-Title", app_name)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str::<ChatCompletionResponse>(&body)?)
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            Err(ApiConnectionError::ApiError { status, error_body })
        }
    }

    /// Content of the first choice of a single request.
    async fn completion_content(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<String, ApiConnectionError> {
        self.call_chat_completion(request)
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ApiConnectionError::EmptyResponse)
    }

    /// Retries transient failures up to `max_retries` extra times with
    /// exponential backoff and returns the completion content.
    pub async fn call_with_retry(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<String, ApiConnectionError> {
        let mut attempt: u32 = 0;
        loop {
            match self.completion_content(request).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        ?delay,
                        "transient generation service error, retrying: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(1u32 << attempt.min(6))
    }
}

#[async_trait]
impl GenerationService for OpenRouterClient {
    async fn invoke(
        &self,
        prompt: &str,
        schema: Option<&JsonSchemaDefinition>,
    ) -> Result<RawResponse, ApiConnectionError> {
        let request = self.build_request(prompt, schema);
        let content = self.call_with_retry(&request).await?;
        debug!(structured = schema.is_some(), "raw completion content:\n{content}");

        Ok(RawResponse { content })
    }
}
