//! Evidence Source Client
//!
//! Uniform entry point over every configured provider. A gather fans the
//! query out concurrently, then merges by provider priority (not arrival
//! order) so identical inputs always produce identical evidence lists.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::models::EvidenceSnippet;
use crate::search::arxiv::ArxivProvider;
use crate::search::google::GoogleSearchProvider;
use crate::search::nasa::NasaApodProvider;
use crate::search::serpapi::{SerpApiClient, SerpApiProvider, SerpEngine};
use crate::search::{EvidenceProvider, ProviderError};
use crate::utils::retry::RetryPolicy;

/// Merged result of one fan-out
#[derive(Debug, Default)]
pub struct EvidenceGathering {
    pub snippets: Vec<EvidenceSnippet>,
    /// Providers that failed, with their errors, in priority order
    pub failures: Vec<(String, ProviderError)>,
}

impl EvidenceGathering {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct EvidenceClient {
    providers: Vec<Arc<dyn EvidenceProvider>>,
}

impl EvidenceClient {
    /// Providers are consulted and merged in the given order
    pub fn new(providers: Vec<Arc<dyn EvidenceProvider>>) -> Self {
        Self { providers }
    }

    /// Reorders `providers` by `priority` (ids listed first win). Unlisted
    /// providers keep their relative order after the listed ones.
    pub fn with_priority(mut providers: Vec<Arc<dyn EvidenceProvider>>, priority: &[String]) -> Self {
        providers.sort_by_key(|p| {
            priority
                .iter()
                .position(|id| id == p.id())
                .unwrap_or(priority.len())
        });
        Self { providers }
    }

    /// Builds every provider that has the credentials it needs
    pub fn from_config(config: &SearchConfig) -> Self {
        let retry = RetryPolicy::new(
            config.max_retries.max(1),
            Duration::from_millis(config.retry_delay_ms),
        );
        let mut providers: Vec<Arc<dyn EvidenceProvider>> = Vec::new();

        if !config.serpapi_key.is_empty() {
            let client = Arc::new(SerpApiClient::new(config.serpapi_key.clone()));
            if config.scholar_enabled {
                providers.push(Arc::new(
                    SerpApiProvider::new(client.clone(), SerpEngine::Scholar).with_retry(retry.clone()),
                ));
            }
            if config.light_enabled {
                providers.push(Arc::new(
                    SerpApiProvider::new(client, SerpEngine::Light).with_retry(retry.clone()),
                ));
            }
        }

        if !config.google_api_key.is_empty() && !config.google_cx.is_empty() {
            providers.push(Arc::new(
                GoogleSearchProvider::new(config.google_api_key.clone(), config.google_cx.clone())
                    .with_retry(retry.clone()),
            ));
        }

        if !config.nasa_api_key.is_empty() {
            providers.push(Arc::new(
                NasaApodProvider::new(config.nasa_api_key.clone()).with_retry(retry.clone()),
            ));
        }

        if config.arxiv_enabled {
            providers.push(Arc::new(ArxivProvider::new().with_retry(retry)));
        }

        let client = Self::with_priority(providers, &config.provider_priority);
        info!(providers = ?client.provider_ids(), "Evidence client configured");
        client
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Queries one provider by id
    pub async fn search(
        &self,
        provider_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.id() == provider_id)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_id.to_string()))?;
        provider.search(query, max_results).await
    }

    /// Queries every provider that accepts `query`, concurrently, each under
    /// `timeout`. Failures are collected instead of aborting the gather.
    pub async fn gather(&self, query: &str, max_results: usize, timeout: Duration) -> EvidenceGathering {
        let active: Vec<&Arc<dyn EvidenceProvider>> =
            self.providers.iter().filter(|p| p.accepts(query)).collect();

        debug!(query = %query, providers = active.len(), "Gathering evidence");

        let outcomes = join_all(active.iter().map(|provider| async move {
            let result = match tokio::time::timeout(timeout, provider.search(query, max_results)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: provider.id().to_string(),
                    secs: timeout.as_secs(),
                }),
            };
            (provider.id().to_string(), result)
        }))
        .await;

        // join_all preserves input order, which is priority order
        let mut gathering = EvidenceGathering::default();
        let mut seen = HashSet::new();
        for (provider_id, result) in outcomes {
            match result {
                Ok(snippets) => {
                    debug!(provider = %provider_id, count = snippets.len(), "Provider returned evidence");
                    for snippet in snippets.into_iter().take(max_results) {
                        if seen.insert(snippet.dedup_key()) {
                            gathering.snippets.push(snippet);
                        }
                    }
                }
                Err(e) => {
                    warn!(provider = %provider_id, error = %e, "Evidence provider failed");
                    gathering.failures.push((provider_id, e));
                }
            }
        }

        info!(
            query = %query,
            snippets = gathering.snippets.len(),
            failures = gathering.failures.len(),
            "Evidence gathered"
        );
        gathering
    }
}
