//! SerpAPI Client
//!
//! Provides search functionality using SerpAPI for:
//! - Google Scholar: Academic papers, citations, and research
//! - Google Light: Quick general web search for supplementary information
//!
//! Each engine is exposed as its own [`EvidenceProvider`] ("scholar" and
//! "light") so the evidence client can run and merge them independently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use tracing::{debug, info};

use crate::models::EvidenceSnippet;
use crate::search::{EvidenceProvider, ProviderError};
use crate::utils::retry::{with_retry, RetryPolicy};

/// Result from a Google Scholar search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarResult {
    pub title: String,
    pub authors: Option<String>,
    pub year: Option<i32>,
    /// Short snippet/abstract from the paper
    pub snippet: String,
    pub link: Option<String>,
    pub citations: Option<i32>,
    pub doi: Option<String>,
    /// Publication venue (journal, conference, etc.)
    pub publication: Option<String>,
}

/// Result from a Google Light search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
    /// Source domain
    pub source: Option<String>,
    pub date: Option<String>,
}

/// SerpAPI client for scientific search
pub struct SerpApiClient {
    api_key: String,
}

impl SerpApiClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    async fn fetch(&self, engine: &str, params: HashMap<String, String>) -> Result<serde_json::Value, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey("SerpAPI".to_string()));
        }
        let search = SerpApiSearch::google(params, self.api_key.clone());
        search
            .json()
            .await
            .map_err(|e| ProviderError::request(engine, e.to_string()))
    }

    /// Search Google Scholar for academic papers
    pub async fn search_scholar(&self, query: &str, max_results: usize) -> Result<Vec<ScholarResult>, ProviderError> {
        info!(query = %query, "Searching Google Scholar via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_scholar".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("num".to_string(), max_results.to_string());

        let results = self.fetch("scholar", params).await?;
        debug!("Raw Scholar response received");

        let scholar_results = parse_scholar_results(&results, max_results)?;
        info!(count = scholar_results.len(), "Google Scholar search completed");
        Ok(scholar_results)
    }

    /// Search Google Light for quick web results
    pub async fn search_light(&self, query: &str, max_results: usize) -> Result<Vec<LightResult>, ProviderError> {
        info!(query = %query, "Searching Google Light via SerpAPI");

        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google_light".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), max_results.to_string());

        let results = self.fetch("light", params).await?;
        debug!("Raw Light response received");

        let light_results = parse_light_results(&results, max_results)?;
        info!(count = light_results.len(), "Google Light search completed");
        Ok(light_results)
    }
}

/// Which SerpAPI engine a provider wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpEngine {
    Scholar,
    Light,
}

pub struct SerpApiProvider {
    client: Arc<SerpApiClient>,
    engine: SerpEngine,
    retry: RetryPolicy,
}

impl SerpApiProvider {
    pub fn new(client: Arc<SerpApiClient>, engine: SerpEngine) -> Self {
        Self {
            client,
            engine,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EvidenceProvider for SerpApiProvider {
    fn id(&self) -> &str {
        match self.engine {
            SerpEngine::Scholar => "scholar",
            SerpEngine::Light => "light",
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        match self.engine {
            SerpEngine::Scholar => {
                let results = with_retry(&self.retry, "scholar", || {
                    self.client.search_scholar(query, max_results)
                })
                .await?;
                Ok(results
                    .into_iter()
                    .map(|r| scholar_to_snippet(r, query))
                    .collect())
            }
            SerpEngine::Light => {
                // Scientific context improves the general-web results
                let scientific_query = format!("{} research study scientific", query);
                let results = with_retry(&self.retry, "light", || {
                    self.client.search_light(&scientific_query, max_results)
                })
                .await?;
                Ok(results
                    .into_iter()
                    .filter(|r| is_reliable_source(&r.link))
                    .map(|r| {
                        EvidenceSnippet::new("light", r.snippet, query)
                            .with_title(r.title)
                            .with_url(r.link)
                    })
                    .collect())
            }
        }
    }
}

fn scholar_to_snippet(result: ScholarResult, query: &str) -> EvidenceSnippet {
    let mut text = result.snippet;
    let citation: Vec<String> = [
        result.authors,
        result.publication,
        result.year.map(|y| y.to_string()),
        result.doi.map(|d| format!("doi:{}", d)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !citation.is_empty() {
        text = format!("{} ({})", text, citation.join(", "));
    }

    let snippet = EvidenceSnippet::new("scholar", text, query).with_title(result.title);
    match result.link {
        Some(link) => snippet.with_url(link),
        None => snippet,
    }
}

/// Organic results, or an empty list when the engine found nothing
fn organic_results<'a>(results: &'a serde_json::Value, provider: &str) -> Result<&'a [serde_json::Value], ProviderError> {
    match results.get("organic_results") {
        None => Ok(&[]),
        Some(organic) => organic
            .as_array()
            .map(|a| a.as_slice())
            .ok_or_else(|| ProviderError::parse(provider, "Expected array of results")),
    }
}

fn parse_scholar_results(results: &serde_json::Value, max_results: usize) -> Result<Vec<ScholarResult>, ProviderError> {
    let mut scholar_results = Vec::new();
    for result in organic_results(results, "scholar")?.iter().take(max_results) {
        let title = result.get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();

        let snippet = result.get("snippet")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if snippet.trim().is_empty() {
            continue;
        }

        let link = result.get("link")
            .and_then(|v| v.as_str())
            .map(String::from);

        // Summary is usually "Authors - Journal, Year - host"
        let summary = result
            .get("publication_info")
            .and_then(|p| p.get("summary"))
            .and_then(|v| v.as_str());

        let authors = summary.map(|s| s.split(" - ").next().unwrap_or(s).to_string());

        let year = summary.and_then(|s| {
            s.split(|c: char| !c.is_numeric())
                .find(|part| part.len() == 4)
                .and_then(|y| y.parse::<i32>().ok())
                .filter(|&y| (1900..=2100).contains(&y))
        });

        let publication = summary.and_then(|s| {
            let parts: Vec<&str> = s.split(" - ").collect();
            if parts.len() > 1 {
                Some(parts[1..].join(" - "))
            } else {
                None
            }
        });

        let citations = result.get("inline_links")
            .and_then(|links| links.get("cited_by"))
            .and_then(|cited| cited.get("total"))
            .and_then(|v| v.as_i64())
            .map(|n| n as i32);

        let doi = link.as_deref()
            .and_then(extract_doi)
            .or_else(|| extract_doi(&snippet));

        scholar_results.push(ScholarResult {
            title,
            authors,
            year,
            snippet,
            link,
            citations,
            doi,
            publication,
        });
    }
    Ok(scholar_results)
}

fn parse_light_results(results: &serde_json::Value, max_results: usize) -> Result<Vec<LightResult>, ProviderError> {
    let mut light_results = Vec::new();
    for result in organic_results(results, "light")?.iter().take(max_results) {
        let title = result.get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();

        let snippet = result.get("snippet")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let link = result.get("link")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let source = result.get("source")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| link.split('/').nth(2).map(String::from));

        let date = result.get("date")
            .and_then(|v| v.as_str())
            .map(String::from);

        light_results.push(LightResult {
            title,
            snippet,
            link,
            source,
            date,
        });
    }
    Ok(light_results)
}

/// Extract DOI from a string (URL or text)
fn extract_doi(text: &str) -> Option<String> {
    let doi_patterns = ["doi.org/", "doi:", "DOI:", "DOI "];

    for pattern in doi_patterns {
        if let Some(pos) = text.find(pattern) {
            let start = pos + pattern.len();
            let doi_part: String = text[start..]
                .trim_start()
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '"' && *c != '>' && *c != '<')
                .collect();
            if doi_part.starts_with("10.") {
                return Some(doi_part);
            }
        }
    }

    // Bare DOI pattern: 10.xxxx/xxxxx
    if let Some(pos) = text.find("10.") {
        let doi_part: String = text[pos..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '.' || *c == '/' || *c == '-' || *c == '_')
            .collect();
        if doi_part.len() > 7 && doi_part.contains('/') {
            return Some(doi_part);
        }
    }

    None
}

/// Check if a URL is from a reliable scientific source
fn is_reliable_source(url: &str) -> bool {
    let reliable_domains = [
        // Academic publishers
        "ncbi.nlm.nih.gov",
        "nih.gov",
        "nature.com",
        "science.org",
        "sciencedirect.com",
        "springer.com",
        "wiley.com",
        "cell.com",
        "plos.org",
        "frontiersin.org",
        "mdpi.com",
        "biomedcentral.com",
        "biorxiv.org",
        "medrxiv.org",
        "arxiv.org",
        // Space agencies
        "nasa.gov",
        "esa.int",
        // Academic institutions
        ".edu",
        ".ac.uk",
        // Government/research
        ".gov",
        "who.int",
        // Wikipedia (useful for overviews)
        "wikipedia.org",
    ];

    let url_lower = url.to_lowercase();
    reliable_domains.iter().any(|domain| url_lower.contains(domain))
}
