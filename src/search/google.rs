//! Google Custom Search provider for general web evidence

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::models::EvidenceSnippet;
use crate::search::{is_space_query, EvidenceProvider, ProviderError};
use crate::utils::retry::{with_retry, RetryPolicy};

const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// The API caps `num` at 10
const GOOGLE_MAX_NUM: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

pub struct GoogleSearchProvider {
    client: Client,
    api_key: String,
    cx: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl GoogleSearchProvider {
    pub fn new(api_key: String, cx: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            cx,
            endpoint: GOOGLE_CSE_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the provider at a different endpoint (mirrors, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, query: &str, num: usize) -> Result<SearchResponse, ProviderError> {
        let num = num.clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::request("google", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                "google",
                format!("status {}: {}", status, body),
            ));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| ProviderError::parse("google", e.to_string()))
    }
}

#[async_trait]
impl EvidenceProvider for GoogleSearchProvider {
    fn id(&self) -> &str {
        "google"
    }

    /// Space queries go to the astronomy provider instead
    fn accepts(&self, query: &str) -> bool {
        !is_space_query(query)
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        if self.api_key.is_empty() || self.cx.is_empty() {
            return Err(ProviderError::NoApiKey("Google Custom Search".to_string()));
        }

        info!(query = %query, "Querying Google Custom Search API");
        let response = with_retry(&self.retry, "google", || self.fetch(query, max_results)).await?;

        let snippets: Vec<EvidenceSnippet> = response
            .items
            .into_iter()
            .filter(|item| !item.snippet.trim().is_empty())
            .take(max_results)
            .map(|item| {
                EvidenceSnippet::new("google", item.snippet.trim(), query)
                    .with_title(item.title)
                    .with_url(item.link)
            })
            .collect();

        info!(count = snippets.len(), "Google Custom Search completed");
        Ok(snippets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_google_search_parses_items() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/customsearch/v1")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".into(), "seed germination".into()),
                mockito::Matcher::UrlEncoded("key".into(), "test-key".into()),
                mockito::Matcher::UrlEncoded("cx".into(), "test-cx".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "items": [
                        {"title": "Germination basics", "link": "https://example.edu/g", "snippet": "Seeds need water."},
                        {"title": "No snippet", "link": "https://example.edu/n", "snippet": ""}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = GoogleSearchProvider::new("test-key".to_string(), "test-cx".to_string())
            .with_endpoint(format!("{}/customsearch/v1", server.url()));
        let snippets = provider.search("seed germination", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].source, "google");
        assert_eq!(snippets[0].title.as_deref(), Some("Germination basics"));
        assert_eq!(snippets[0].url.as_deref(), Some("https://example.edu/g"));
    }

    #[tokio::test]
    async fn test_google_search_retries_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/customsearch/v1")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_body("quota")
            .expect(2)
            .create_async()
            .await;

        let provider = GoogleSearchProvider::new("k".to_string(), "cx".to_string())
            .with_endpoint(format!("{}/customsearch/v1", server.url()))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));
        let err = provider.search("seeds", 5).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ProviderError::RequestFailed { .. }));
    }

    #[test]
    fn test_google_skips_space_queries() {
        let provider = GoogleSearchProvider::new("k".to_string(), "cx".to_string());
        assert!(!provider.accepts("asteroid mining economics"));
        assert!(provider.accepts("plant root growth"));
    }
}
