//! Evidence selection
//!
//! Two selectors share the same contract: the output is a subset of the
//! candidates in their original order, every kept snippet is marked
//! `selected`, and running a selector over its own output returns it unchanged.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{format_evidence, invoke_model, parse_json_response, EvidenceSelector};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, EvidenceSnippet, Hypothesis};
use crate::search::keywords;
use crate::types::AppResult;

pub const SYSTEM_PROMPT: &str = "You are an evidence selection agent. From a numbered list of \
retrieved snippets you keep only those relevant to a hypothesis. Respond with JSON only.";

/// Output of a previous selection pass; selecting again must not change it
fn already_selected(candidates: &[EvidenceSnippet]) -> bool {
    candidates.iter().all(|snippet| snippet.selected)
}

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    selected: Vec<usize>,
}

/// Model-backed selector
pub struct LlmEvidenceSelector {
    llm: LLM,
}

impl LlmEvidenceSelector {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    fn build_prompt(hypothesis: &Hypothesis, candidates: &[EvidenceSnippet]) -> String {
        format!(
            r#"Select the evidence relevant to the hypothesis.

HYPOTHESIS:
{hypothesis}

CANDIDATE EVIDENCE:
{evidence}

Keep a snippet if it supports, contradicts or directly informs the hypothesis.
Drop snippets that only share vocabulary with it.

OUTPUT FORMAT (respond with ONLY valid JSON, 1-based numbers from the list):
{{
  "selected": [1, 3]
}}"#,
            hypothesis = hypothesis.text(),
            evidence = format_evidence(candidates)
        )
    }
}

#[async_trait]
impl EvidenceSelector for LlmEvidenceSelector {
    async fn select(
        &self,
        hypothesis: &Hypothesis,
        candidates: &[EvidenceSnippet],
    ) -> AppResult<Vec<EvidenceSnippet>> {
        if candidates.is_empty() || already_selected(candidates) {
            return Ok(candidates.to_vec());
        }

        let prompt = Self::build_prompt(hypothesis, candidates);
        let params = InvocationParams::new(SYSTEM_PROMPT)
            .with_temperature(0.0)
            .with_max_tokens(256);

        let response = invoke_model(&self.llm, AgentKind::EvidenceSelection, &prompt, &params).await?;
        let parsed: SelectionResponse = parse_json_response(AgentKind::EvidenceSelection, &response)?;

        let keep: HashSet<usize> = parsed
            .selected
            .into_iter()
            .filter(|n| *n >= 1 && *n <= candidates.len())
            .map(|n| n - 1)
            .collect();

        let selected: Vec<EvidenceSnippet> = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, snippet)| snippet.clone().mark_selected())
            .collect();

        info!(candidates = candidates.len(), selected = selected.len(), "Selected evidence");
        Ok(selected)
    }
}

/// Lexical selector: keeps snippets sharing at least `min_overlap` keywords
/// with the hypothesis. Used when no model is available for selection.
pub struct KeywordSelector {
    min_overlap: usize,
}

impl KeywordSelector {
    pub fn new(min_overlap: usize) -> Self {
        Self {
            min_overlap: min_overlap.max(1),
        }
    }

    fn overlap(hypothesis_terms: &HashSet<String>, snippet: &EvidenceSnippet) -> usize {
        keywords(&snippet.display_text())
            .into_iter()
            .filter(|term| hypothesis_terms.contains(term))
            .count()
    }
}

impl Default for KeywordSelector {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl EvidenceSelector for KeywordSelector {
    async fn select(
        &self,
        hypothesis: &Hypothesis,
        candidates: &[EvidenceSnippet],
    ) -> AppResult<Vec<EvidenceSnippet>> {
        if candidates.is_empty() || already_selected(candidates) {
            return Ok(candidates.to_vec());
        }

        let terms: HashSet<String> = keywords(hypothesis.text()).into_iter().collect();
        let selected: Vec<EvidenceSnippet> = candidates
            .iter()
            .filter(|snippet| Self::overlap(&terms, snippet) >= self.min_overlap)
            .map(|snippet| snippet.clone().mark_selected())
            .collect();

        debug!(candidates = candidates.len(), selected = selected.len(), "Keyword selection");
        Ok(selected)
    }
}
