//! Shared test doubles for supervisor tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use hypothesis_lab::agents::{
    AgentSet, EvolutionAgent, GenerationAgent, KeywordSelector, RankingAgent, ReflectionAgent,
    SummarizationAgent,
};
use hypothesis_lab::models::{
    AgentKind, EvidenceSnippet, Hypothesis, RankScore, Reflection, ScoreDimension, Topic,
};
use hypothesis_lab::search::{EvidenceClient, EvidenceProvider, ProviderError};
use hypothesis_lab::types::{AppError, AppResult};

pub const NO_EVIDENCE: &str = "No evidence was available";

pub struct FixedGeneration {
    pub text: String,
    pub calls: AtomicUsize,
}

impl FixedGeneration {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerationAgent for FixedGeneration {
    async fn generate(&self, _topic: &Topic) -> AppResult<Hypothesis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Hypothesis::new(self.text.clone(), AgentKind::Generation, 0)
    }
}

/// Appends a marker to the hypothesis and describes the evidence it saw
pub struct MarkingReflection;

#[async_trait]
impl ReflectionAgent for MarkingReflection {
    async fn reflect(&self, hypothesis: &Hypothesis, evidence: &[EvidenceSnippet]) -> AppResult<Reflection> {
        let rationale = if evidence.is_empty() {
            format!("{}; kept the claim unchanged.", NO_EVIDENCE)
        } else {
            format!("Considered {} snippets.", evidence.len())
        };
        Ok(Reflection {
            hypothesis: Hypothesis::new(
                format!("{} (reflected)", hypothesis.text()),
                AgentKind::Reflection,
                hypothesis.iteration(),
            )?,
            rationale,
        })
    }
}

/// Scores every dimension with the value scripted for the iteration;
/// iterations past the script reuse the last value
pub struct ScriptedRanking {
    pub values: Vec<f64>,
    pub cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedRanking {
    pub fn new(values: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            values: values.to_vec(),
            cancel_after: None,
        })
    }

    pub fn cancelling_at(values: &[f64], iteration: usize, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            values: values.to_vec(),
            cancel_after: Some((iteration, token)),
        })
    }
}

#[async_trait]
impl RankingAgent for ScriptedRanking {
    async fn rank(&self, hypothesis: &Hypothesis, _rationale: &str) -> AppResult<RankScore> {
        if let Some((iteration, token)) = &self.cancel_after {
            if *iteration == hypothesis.iteration() {
                token.cancel();
            }
        }
        let value = self
            .values
            .get(hypothesis.iteration())
            .or(self.values.last())
            .copied()
            .unwrap_or(5.0);
        RankScore::new(
            hypothesis,
            ScoreDimension::ALL.iter().map(|d| (*d, value)),
        )
    }
}

pub struct CountingEvolution {
    pub delay: Option<Duration>,
}

impl CountingEvolution {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { delay: None })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay: Some(delay) })
    }
}

#[async_trait]
impl EvolutionAgent for CountingEvolution {
    async fn evolve(
        &self,
        hypothesis: &Hypothesis,
        score_history: &[RankScore],
        _rationale: &str,
    ) -> AppResult<Hypothesis> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        assert_eq!(score_history.len(), hypothesis.iteration() + 1);
        Hypothesis::new(
            format!("Microgravity delays seed germination (refinement {})", hypothesis.iteration() + 1),
            AgentKind::Evolution,
            hypothesis.iteration() + 1,
        )
    }
}

pub struct TrajectorySummarizer {
    pub calls: AtomicUsize,
}

impl TrajectorySummarizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SummarizationAgent for TrajectorySummarizer {
    async fn summarize(&self, evidence: &[EvidenceSnippet], trajectory: &[Hypothesis]) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = trajectory
            .last()
            .ok_or_else(|| AppError::agent(AgentKind::Summarization, "empty trajectory"))?;
        Ok(format!(
            "Explored {} hypotheses with {} snippets. Final: {}",
            trajectory.len(),
            evidence.len(),
            last.text()
        ))
    }
}

pub fn agents(ranking: Arc<ScriptedRanking>) -> AgentSet {
    AgentSet {
        generation: FixedGeneration::new("Microgravity delays seed germination"),
        selector: Arc::new(KeywordSelector::default()),
        reflection: Arc::new(MarkingReflection),
        ranking,
        evolution: CountingEvolution::new(),
        summarization: TrajectorySummarizer::new(),
    }
}

pub enum ProviderBehavior {
    Snippets(Vec<&'static str>),
    Empty,
    Fail,
}

pub struct StaticProvider {
    pub id: String,
    pub behavior: ProviderBehavior,
    pub calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(id: &str, behavior: ProviderBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceSnippet>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ProviderBehavior::Snippets(texts) => Ok(texts
                .iter()
                .take(max_results)
                .map(|t| EvidenceSnippet::new(self.id.clone(), *t, query))
                .collect()),
            ProviderBehavior::Empty => Ok(vec![]),
            ProviderBehavior::Fail => Err(ProviderError::request(&self.id, "HTTP 503")),
        }
    }
}

pub fn evidence(providers: Vec<Arc<StaticProvider>>) -> EvidenceClient {
    EvidenceClient::new(
        providers
            .into_iter()
            .map(|p| p as Arc<dyn EvidenceProvider>)
            .collect(),
    )
}
