use async_trait::async_trait;
use dotenv::dotenv;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::debug;

use super::{SearchError, WebSearch, NO_RESULTS};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const TAVILY_API_KEY_ENV_VAR: &str = "TAVILY_API_KEY";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct TavilySearch {
    http: Client,
    base_url: String,
    api_key_env_var: String,
    api_key: Option<String>,
}

impl TavilySearch {
    pub fn new(request_timeout: Duration) -> Result<Self, SearchError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: TAVILY_BASE_URL.to_string(),
            api_key_env_var: TAVILY_API_KEY_ENV_VAR.to_string(),
            api_key: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn resolve_api_key(&self) -> Result<String, SearchError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        dotenv().ok();
        env::var(&self.api_key_env_var)
            .map_err(|_| SearchError::MissingApiKey(self.api_key_env_var.clone()))
    }
}

fn format_results(results: &[TavilyResult]) -> String {
    let snippets: Vec<String> = results
        .iter()
        .filter(|r| !r.content.trim().is_empty())
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})\n{}", i + 1, r.title, r.url, r.content.trim()))
        .collect();

    if snippets.is_empty() {
        NO_RESULTS.to_string()
    } else {
        snippets.join("\n\n")
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<String, SearchError> {
        if max_results == 0 {
            return Ok(NO_RESULTS.to_string());
        }
        let api_key = self.resolve_api_key()?;

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key)
            .json(&TavilyRequest {
                query,
                max_results,
                search_depth: "basic",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SearchError::Api { status, body });
        }

        let parsed: TavilyResponse = response.json().await?;
        debug!(query, hits = parsed.results.len(), "web search finished");
        Ok(format_results(&parsed.results))
    }
}
