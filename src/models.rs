//! Domain Models
//!
//! Validated value types passed between the supervisor and the agents.
//! Every agent boundary produces one of these, so malformed model output is
//! rejected where it enters the system instead of travelling on as a string.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AppError, AppResult};

/// Lower bound of every score dimension
pub const SCORE_MIN: f64 = 0.0;
/// Upper bound of every score dimension
pub const SCORE_MAX: f64 = 10.0;

/// The research question a run refines hypotheses for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn new(text: impl Into<String>) -> AppResult<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::Configuration("topic must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The agent that produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Generation,
    Reflection,
    Ranking,
    Evolution,
    EvidenceSelection,
    Summarization,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Generation => write!(f, "generation"),
            AgentKind::Reflection => write!(f, "reflection"),
            AgentKind::Ranking => write!(f, "ranking"),
            AgentKind::Evolution => write!(f, "evolution"),
            AgentKind::EvidenceSelection => write!(f, "evidence_selection"),
            AgentKind::Summarization => write!(f, "summarization"),
        }
    }
}

/// A versioned research claim. Refinement always creates a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    id: Uuid,
    text: String,
    origin: AgentKind,
    iteration: usize,
    created_at: DateTime<Utc>,
}

impl Hypothesis {
    /// Rejects empty content; the error is attributed to `origin`.
    pub fn new(text: impl Into<String>, origin: AgentKind, iteration: usize) -> AppResult<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::agent(origin, "produced an empty hypothesis"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: trimmed.to_string(),
            origin,
            iteration,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> AgentKind {
        self.origin
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One piece of external evidence returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    /// Provider identifier, e.g. "scholar" or "arxiv"
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Query that retrieved this snippet
    pub query: String,
    /// Set once the evidence selector kept the snippet
    #[serde(default)]
    pub selected: bool,
}

impl EvidenceSnippet {
    pub fn new(source: impl Into<String>, text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: None,
            text: text.into(),
            url: None,
            query: query.into(),
            selected: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn mark_selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Identity used for de-duplication across providers and iterations
    pub fn dedup_key(&self) -> (String, String) {
        (self.source.clone(), self.text.trim().to_lowercase())
    }

    /// Title plus text, for prompts and keyword matching
    pub fn display_text(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => format!("{}: {}", title, self.text),
            _ => self.text.clone(),
        }
    }
}

/// Quality dimensions the ranking agent scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    Novelty,
    Feasibility,
    EvidenceSupport,
}

impl ScoreDimension {
    pub const ALL: [ScoreDimension; 3] = [
        ScoreDimension::Novelty,
        ScoreDimension::Feasibility,
        ScoreDimension::EvidenceSupport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreDimension::Novelty => "novelty",
            ScoreDimension::Feasibility => "feasibility",
            ScoreDimension::EvidenceSupport => "evidence_support",
        }
    }
}

impl std::fmt::Display for ScoreDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of exactly one hypothesis at one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankScore {
    hypothesis_id: Uuid,
    iteration: usize,
    dimensions: BTreeMap<ScoreDimension, f64>,
    aggregate: f64,
}

impl RankScore {
    /// Builds a score, rejecting any dimension outside [`SCORE_MIN`, `SCORE_MAX`].
    /// Out-of-range values are never clamped.
    pub fn new(
        hypothesis: &Hypothesis,
        dimensions: impl IntoIterator<Item = (ScoreDimension, f64)>,
    ) -> AppResult<Self> {
        let dimensions: BTreeMap<ScoreDimension, f64> = dimensions.into_iter().collect();
        if dimensions.is_empty() {
            return Err(AppError::agent(AgentKind::Ranking, "score has no dimensions"));
        }

        for (dimension, value) in &dimensions {
            if !value.is_finite() || *value < SCORE_MIN || *value > SCORE_MAX {
                return Err(AppError::InvalidScore {
                    dimension: dimension.to_string(),
                    value: *value,
                    min: SCORE_MIN,
                    max: SCORE_MAX,
                });
            }
        }

        let aggregate = dimensions.values().sum::<f64>() / dimensions.len() as f64;

        Ok(Self {
            hypothesis_id: hypothesis.id(),
            iteration: hypothesis.iteration(),
            dimensions,
            aggregate,
        })
    }

    pub fn hypothesis_id(&self) -> Uuid {
        self.hypothesis_id
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn dimensions(&self) -> &BTreeMap<ScoreDimension, f64> {
        &self.dimensions
    }

    pub fn get(&self, dimension: ScoreDimension) -> Option<f64> {
        self.dimensions.get(&dimension).copied()
    }

    /// Mean of all dimensions
    pub fn aggregate(&self) -> f64 {
        self.aggregate
    }
}

/// Output of the reflection agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub hypothesis: Hypothesis,
    pub rationale: String,
}

/// Everything one loop pass consumed and produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub input_hypothesis: Hypothesis,
    pub evidence: Vec<EvidenceSnippet>,
    pub evidence_query: String,
    pub reflected_hypothesis: Hypothesis,
    pub rationale: String,
    pub score: RankScore,
    pub output_hypothesis: Hypothesis,
    pub completed_at: DateTime<Utc>,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    ExhaustedIterations,
    Plateau,
    Error,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ExhaustedIterations => write!(f, "exhausted-iterations"),
            StopReason::Plateau => write!(f, "plateau"),
            StopReason::Error => write!(f, "error"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub supervisor: std::sync::Arc<crate::supervisor::Supervisor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub evidence_providers: Vec<String>,
}

/// Body of `POST /api/runs`; a missing config means the server defaults
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunRequest {
    pub topic: String,
    #[serde(default)]
    pub config: Option<crate::config::RunConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
