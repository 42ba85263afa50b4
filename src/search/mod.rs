//! Search Module
//!
//! Evidence retrieval from external providers behind one trait:
//! - Google Scholar (primary) and Google Light via SerpAPI
//! - Google Custom Search for general web results
//! - NASA APOD for astronomy and space queries
//! - arXiv for recent preprints
//!
//! [`EvidenceClient`] fans a query out to every enabled provider concurrently
//! and merges the results in provider-priority order.

pub mod arxiv;
pub mod client;
pub mod google;
pub mod nasa;
pub mod query;
pub mod serpapi;

pub use client::{EvidenceClient, EvidenceGathering};
pub use query::{derive_query, is_space_query, keywords};
pub use serpapi::{SerpApiClient, SerpApiProvider, SerpEngine};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::EvidenceSnippet;

/// Errors that can occur while querying an evidence provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} API key not configured")]
    NoApiKey(String),

    #[error("{provider} request failed: {message}")]
    RequestFailed { provider: String, message: String },

    #[error("Failed to parse {provider} results: {message}")]
    ParseError { provider: String, message: String },

    #[error("{provider} timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("Search engine not enabled: {0}")]
    EngineDisabled(String),

    #[error("Unknown evidence provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    pub fn request(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::RequestFailed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn parse(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::ParseError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// A single external data source
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    /// Stable identifier, also used as the snippet source
    fn id(&self) -> &str;

    /// Whether this provider should be consulted for `query`
    fn accepts(&self, _query: &str) -> bool {
        true
    }

    /// Ranked snippets for `query`, best first. No results is `Ok(vec![])`.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EvidenceSnippet>, ProviderError>;
}
