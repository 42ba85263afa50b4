//! arXiv provider
//!
//! Queries the arXiv Atom API sorted by submission date and keeps only
//! papers published within the recency window (five years by default).

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::{debug, info};

use crate::models::EvidenceSnippet;
use crate::search::{EvidenceProvider, ProviderError};
use crate::utils::retry::{with_retry, RetryPolicy};

const ARXIV_ENDPOINT: &str = "http://export.arxiv.org/api/query";
const DEFAULT_RECENCY_YEARS: i32 = 5;

/// One parsed `<entry>` of an arXiv Atom feed
#[derive(Debug, Clone, PartialEq)]
pub struct ArxivEntry {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

impl ArxivEntry {
    pub fn year(&self) -> i32 {
        self.published.map(|p| p.year()).unwrap_or(0)
    }
}

pub struct ArxivProvider {
    client: Client,
    endpoint: String,
    recency_years: i32,
    retry: RetryPolicy,
}

impl ArxivProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: ARXIV_ENDPOINT.to_string(),
            recency_years: DEFAULT_RECENCY_YEARS,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_recency_years(mut self, years: i32) -> Self {
        self.recency_years = years;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<String, ProviderError> {
        let search_query = format!("all:{}", query);
        let max = max_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::request("arxiv", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::request("arxiv", format!("status {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::request("arxiv", e.to_string()))
    }
}

impl Default for ArxivProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceProvider for ArxivProvider {
    fn id(&self) -> &str {
        "arxiv"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        info!(query = %query, "Querying arXiv API for research papers");
        let feed = with_retry(&self.retry, "arxiv", || self.fetch(query, max_results)).await?;

        let threshold_year = Utc::now().year() - self.recency_years;
        let entries = parse_feed(&feed)?;
        let total = entries.len();

        let snippets: Vec<EvidenceSnippet> = entries
            .into_iter()
            .filter(|e| e.year() >= threshold_year)
            .take(max_results)
            .map(|e| {
                let year = e.year();
                EvidenceSnippet::new("arxiv", e.summary, query)
                    .with_title(format!("{} ({})", e.title, year))
                    .with_url(e.link)
            })
            .collect();

        info!(found = total, recent = snippets.len(), "arXiv search completed");
        Ok(snippets)
    }
}

#[derive(Clone, Copy)]
enum EntryField {
    Title,
    Summary,
    Published,
    Id,
}

impl EntryField {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"summary" => Some(Self::Summary),
            b"published" => Some(Self::Published),
            b"id" => Some(Self::Id),
            _ => None,
        }
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    summary: String,
    published: String,
    id: String,
}

impl EntryBuilder {
    fn push(&mut self, field: EntryField, text: &str) {
        let target = match field {
            EntryField::Title => &mut self.title,
            EntryField::Summary => &mut self.summary,
            EntryField::Published => &mut self.published,
            EntryField::Id => &mut self.id,
        };
        target.push_str(text);
    }

    fn build(self) -> Option<ArxivEntry> {
        let title = collapse_whitespace(&self.title);
        let summary = collapse_whitespace(&self.summary);
        if title.is_empty() || summary.is_empty() {
            return None;
        }

        let published = DateTime::parse_from_rfc3339(self.published.trim())
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| debug!(published = %self.published, error = %e, "Unparsable arXiv date"))
            .ok();

        Some(ArxivEntry {
            title,
            summary,
            link: self.id.trim().to_string(),
            published,
        })
    }
}

/// Parses the entries of an Atom feed. Entries without a title or summary
/// are skipped; an unparsable date leaves `published` empty.
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<EntryField> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ProviderError::parse("arxiv", format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(tag) => {
                let name = tag.local_name();
                if name.as_ref() == b"entry" {
                    entry = Some(EntryBuilder::default());
                    field = None;
                } else if entry.is_some() {
                    field = EntryField::from_local_name(name.as_ref());
                }
            }
            Event::End(tag) => {
                if tag.local_name().as_ref() == b"entry" {
                    if let Some(built) = entry.take().and_then(EntryBuilder::build) {
                        entries.push(built);
                    }
                }
                field = None;
            }
            Event::Text(text) => {
                if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                    let decoded = text
                        .unescape()
                        .map_err(|e| ProviderError::parse("arxiv", e.to_string()))?;
                    builder.push(f, &decoded);
                }
            }
            Event::CData(data) => {
                if let (Some(builder), Some(f)) = (entry.as_mut(), field) {
                    builder.push(f, &String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
