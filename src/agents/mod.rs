//! Agent System
//!
//! Stateless, single-purpose agents driven by the supervisor:
//!
//! - **Generation Agent**: proposes an initial hypothesis for a topic
//! - **Evidence Selector**: keeps the retrieved snippets relevant to a hypothesis
//! - **Reflection Agent**: revises a hypothesis against the selected evidence
//! - **Ranking Agent**: scores a reflected hypothesis on fixed dimensions
//! - **Evolution Agent**: proposes the next hypothesis from the score trajectory
//! - **Summarization Agent**: writes the closing narrative of a run
//!
//! ## Pipeline Overview
//!
//! ```text
//!  Topic
//!    │
//!    ▼
//! ┌────────────┐
//! │ Generation │
//! └────────────┘
//!    │
//!    ▼
//! ┌────────────┐   ┌────────────┐   ┌─────────┐   ┌───────────┐
//! │  Evidence  │ → │ Reflection │ → │ Ranking │ → │ Evolution │ ─┐
//! │  Selector  │   └────────────┘   └─────────┘   └───────────┘  │
//! └────────────┘ ◄──────────────── next iteration ───────────────┘
//!    │ (on stop)
//!    ▼
//! ┌───────────────┐
//! │ Summarization │
//! └───────────────┘
//! ```
//!
//! Each agent is a trait so the supervisor can be driven by test doubles;
//! the `Llm*` structs are the model-backed implementations.

pub mod evolution;
pub mod generation;
pub mod ranking;
pub mod reflection;
pub mod selection;
pub mod summarization;

pub use evolution::LlmEvolutionAgent;
pub use generation::LlmGenerationAgent;
pub use ranking::LlmRankingAgent;
pub use reflection::{LlmReflectionAgent, NO_EVIDENCE_NOTE};
pub use selection::{KeywordSelector, LlmEvidenceSelector};
pub use summarization::LlmSummarizationAgent;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, EvidenceSnippet, Hypothesis, RankScore, Reflection, Topic};
use crate::types::{AppError, AppResult};

#[async_trait]
pub trait GenerationAgent: Send + Sync {
    /// Initial hypothesis for `topic`, at iteration 0
    async fn generate(&self, topic: &Topic) -> AppResult<Hypothesis>;
}

#[async_trait]
pub trait EvidenceSelector: Send + Sync {
    /// Relevant subset of `candidates`, in input order, each marked selected
    async fn select(
        &self,
        hypothesis: &Hypothesis,
        candidates: &[EvidenceSnippet],
    ) -> AppResult<Vec<EvidenceSnippet>>;
}

#[async_trait]
pub trait ReflectionAgent: Send + Sync {
    async fn reflect(&self, hypothesis: &Hypothesis, evidence: &[EvidenceSnippet]) -> AppResult<Reflection>;
}

#[async_trait]
pub trait RankingAgent: Send + Sync {
    async fn rank(&self, hypothesis: &Hypothesis, rationale: &str) -> AppResult<RankScore>;
}

#[async_trait]
pub trait EvolutionAgent: Send + Sync {
    /// Next hypothesis, one iteration after `hypothesis`
    async fn evolve(
        &self,
        hypothesis: &Hypothesis,
        score_history: &[RankScore],
        rationale: &str,
    ) -> AppResult<Hypothesis>;
}

#[async_trait]
pub trait SummarizationAgent: Send + Sync {
    async fn summarize(&self, evidence: &[EvidenceSnippet], trajectory: &[Hypothesis]) -> AppResult<String>;
}

/// The fixed set of agents one supervisor drives
#[derive(Clone)]
pub struct AgentSet {
    pub generation: Arc<dyn GenerationAgent>,
    pub selector: Arc<dyn EvidenceSelector>,
    pub reflection: Arc<dyn ReflectionAgent>,
    pub ranking: Arc<dyn RankingAgent>,
    pub evolution: Arc<dyn EvolutionAgent>,
    pub summarization: Arc<dyn SummarizationAgent>,
}

impl AgentSet {
    /// Every agent backed by `llm`, with the model-backed evidence selector
    pub fn llm_backed(llm: LLM) -> Self {
        Self {
            generation: Arc::new(LlmGenerationAgent::new(llm.clone())),
            selector: Arc::new(LlmEvidenceSelector::new(llm.clone())),
            reflection: Arc::new(LlmReflectionAgent::new(llm.clone())),
            ranking: Arc::new(LlmRankingAgent::new(llm.clone())),
            evolution: Arc::new(LlmEvolutionAgent::new(llm.clone())),
            summarization: Arc::new(LlmSummarizationAgent::new(llm)),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn EvidenceSelector>) -> Self {
        self.selector = selector;
        self
    }
}

/// Invokes the model on behalf of `agent`, attributing failures to it
pub(crate) async fn invoke_model(
    llm: &LLM,
    agent: AgentKind,
    prompt: &str,
    params: &InvocationParams,
) -> AppResult<String> {
    llm.invoke(prompt, params)
        .await
        .map_err(|e| AppError::agent(agent, e.to_string()))
}

/// Strips a markdown code fence around a JSON payload, if present
pub(crate) fn extract_json(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

/// Parses a JSON object out of a model response. Falls back to the
/// outermost `{...}` span when the model wrapped it in prose.
pub(crate) fn parse_json_response<T: DeserializeOwned>(agent: AgentKind, response: &str) -> AppResult<T> {
    let candidate = extract_json(response);
    match serde_json::from_str::<T>(candidate) {
        Ok(parsed) => Ok(parsed),
        Err(first_error) => {
            let start = response.find('{');
            let end = response.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str::<T>(&response[s..=e])
                    .map_err(|e| AppError::agent(agent, format!("unparsable response: {}", e))),
                _ => Err(AppError::agent(agent, format!("unparsable response: {}", first_error))),
            }
        }
    }
}

/// Numbered evidence list used in prompts
pub(crate) fn format_evidence(evidence: &[EvidenceSnippet]) -> String {
    evidence
        .iter()
        .enumerate()
        .map(|(i, snippet)| {
            let url = snippet
                .url
                .as_ref()
                .map(|u| format!(" [{}]", u))
                .unwrap_or_default();
            format!("{}. ({}) {}{}", i + 1, snippet.source, snippet.display_text(), url)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::llm::LLMAdapter;
    use crate::types::{LLMRequest, LLMResponse, TokenUsage};
    use std::sync::Mutex;

    /// Replies with canned responses in order and records every request
    pub struct CannedAdapter {
        replies: Mutex<Vec<AppResult<String>>>,
        pub requests: Mutex<Vec<LLMRequest>>,
    }

    impl CannedAdapter {
        pub fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                requests: Mutex::new(vec![]),
            })
        }

        pub fn replying(reply: &str) -> Arc<Self> {
            Self::new(vec![Ok(reply.to_string())])
        }

        pub fn last_prompt(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.messages[0].content.clone())
                .unwrap_or_default()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LLMAdapter for CannedAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AppError::ModelInvocation("no canned reply left".to_string())))?;
            Ok(LLMResponse {
                content: reply,
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    pub fn llm(adapter: Arc<CannedAdapter>) -> LLM {
        LLM::from_adapter(adapter, "test-model")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        hypothesis: String,
    }

    #[test]
    fn test_extract_json_from_fence() {
        let response = "Here you go:\n```json\n{\"hypothesis\": \"x\"}\n```\nThanks";
        assert_eq!(extract_json(response), "{\"hypothesis\": \"x\"}");
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let parsed: Payload =
            parse_json_response(AgentKind::Generation, "Sure! {\"hypothesis\": \"Seeds sprout\"} Hope it helps.")
                .unwrap();
        assert_eq!(parsed.hypothesis, "Seeds sprout");
    }

    #[test]
    fn test_parse_json_failure_is_agent_error() {
        let err = parse_json_response::<Payload>(AgentKind::Ranking, "I cannot score this.").unwrap_err();
        match err {
            AppError::AgentInvocation { agent, message } => {
                assert_eq!(agent, "ranking");
                assert!(message.contains("unparsable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_format_evidence() {
        let evidence = vec![
            EvidenceSnippet::new("arxiv", "Clinostat study", "q").with_url("http://arxiv.org/abs/1"),
            EvidenceSnippet::new("nasa", "Veggie unit", "q"),
        ];
        let text = format_evidence(&evidence);
        assert_eq!(
            text,
            "1. (arxiv) Clinostat study [http://arxiv.org/abs/1]\n2. (nasa) Veggie unit"
        );
    }
}
