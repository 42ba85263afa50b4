// Reflection agent: critiques a hypothesis against selected evidence and revises it

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{format_evidence, invoke_model, parse_json_response, ReflectionAgent};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, EvidenceSnippet, Hypothesis, Reflection};
use crate::types::{AppError, AppResult};

pub const SYSTEM_PROMPT: &str = "You are a scientific reflection agent. You critique a hypothesis \
against the supplied evidence, then revise it so it is better supported and more precise. \
Respond with JSON only.";

/// Prefix guaranteed on every rationale written without evidence
pub const NO_EVIDENCE_NOTE: &str = "No external evidence was available for this iteration.";

#[derive(Debug, Deserialize)]
struct ReflectionResponse {
    hypothesis: String,
    rationale: String,
}

pub struct LlmReflectionAgent {
    llm: LLM,
}

impl LlmReflectionAgent {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    fn build_prompt(hypothesis: &Hypothesis, evidence: &[EvidenceSnippet]) -> String {
        let evidence_block = if evidence.is_empty() {
            format!("{} Reflect using domain knowledge only and say so in the rationale.", NO_EVIDENCE_NOTE)
        } else {
            format_evidence(evidence)
        };

        format!(
            r#"Critically review the hypothesis below against the evidence.

HYPOTHESIS:
{hypothesis}

EVIDENCE:
{evidence}

Consider:
1. Which evidence supports or contradicts the claim
2. Hidden assumptions and confounders
3. How the claim could be made more precise or testable

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "hypothesis": "The revised hypothesis",
  "rationale": "Why the revision was made, citing evidence by number"
}}"#,
            hypothesis = hypothesis.text(),
            evidence = evidence_block
        )
    }
}

#[async_trait]
impl ReflectionAgent for LlmReflectionAgent {
    async fn reflect(&self, hypothesis: &Hypothesis, evidence: &[EvidenceSnippet]) -> AppResult<Reflection> {
        let prompt = Self::build_prompt(hypothesis, evidence);
        let params = InvocationParams::new(SYSTEM_PROMPT).with_temperature(0.4);

        let response = invoke_model(&self.llm, AgentKind::Reflection, &prompt, &params).await?;
        let parsed: ReflectionResponse = parse_json_response(AgentKind::Reflection, &response)?;

        let rationale = parsed.rationale.trim();
        if rationale.is_empty() && !evidence.is_empty() {
            return Err(AppError::agent(AgentKind::Reflection, "produced an empty rationale"));
        }
        let rationale = if evidence.is_empty() && !rationale.starts_with(NO_EVIDENCE_NOTE) {
            format!("{} {}", NO_EVIDENCE_NOTE, rationale).trim_end().to_string()
        } else {
            rationale.to_string()
        };

        let revised = Hypothesis::new(parsed.hypothesis, AgentKind::Reflection, hypothesis.iteration())?;

        debug!(rationale_len = rationale.len(), "Reflection rationale received");
        info!(
            iteration = hypothesis.iteration(),
            evidence_count = evidence.len(),
            "Reflected on hypothesis"
        );

        Ok(Reflection {
            hypothesis: revised,
            rationale,
        })
    }
}
