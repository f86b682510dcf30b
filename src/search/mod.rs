pub mod tavily;

use async_trait::async_trait;
use thiserror::Error;

pub use tavily::TavilySearch;

/// Returned instead of an error when a search finds nothing.
pub const NO_RESULTS: &str = "No web results found.";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("search request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("search API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Web search used to give the model some real recipes as context.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Human-readable concatenation of result snippets, or [`NO_RESULTS`].
    async fn search(&self, query: &str, max_results: usize) -> Result<String, SearchError>;
}
