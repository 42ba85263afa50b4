//! NASA Astronomy Picture of the Day provider, consulted for space queries

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::models::EvidenceSnippet;
use crate::search::{is_space_query, EvidenceProvider, ProviderError};
use crate::utils::retry::{with_retry, RetryPolicy};

const NASA_APOD_ENDPOINT: &str = "https://api.nasa.gov/planetary/apod";

#[derive(Debug, Deserialize)]
struct ApodResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

pub struct NasaApodProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl NasaApodProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: NASA_APOD_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self) -> Result<ApodResponse, ProviderError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("api_key", self.api_key.as_str()), ("hd", "true")])
            .send()
            .await
            .map_err(|e| ProviderError::request("nasa", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::request("nasa", format!("status {}", status)));
        }

        response
            .json::<ApodResponse>()
            .await
            .map_err(|e| ProviderError::parse("nasa", e.to_string()))
    }
}

#[async_trait]
impl EvidenceProvider for NasaApodProvider {
    fn id(&self) -> &str {
        "nasa"
    }

    fn accepts(&self, query: &str) -> bool {
        is_space_query(query)
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey("NASA".to_string()));
        }

        info!(query = %query, "Querying NASA APOD API");
        let apod = with_retry(&self.retry, "nasa", || self.fetch()).await?;

        let explanation = apod.explanation.unwrap_or_default();
        if explanation.trim().is_empty() {
            return Ok(vec![]);
        }

        let title = match (apod.title, apod.date) {
            (Some(title), Some(date)) => format!("NASA APOD {}: {}", date, title),
            (Some(title), None) => format!("NASA APOD: {}", title),
            _ => "NASA APOD".to_string(),
        };

        let snippet = EvidenceSnippet::new("nasa", explanation.trim(), query).with_title(title);
        Ok(vec![match apod.url {
            Some(url) => snippet.with_url(url),
            None => snippet,
        }])
    }
}
