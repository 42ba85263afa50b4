// Summarization agent: narrative of a finished run

use async_trait::async_trait;
use tracing::info;

use super::{format_evidence, invoke_model, SummarizationAgent};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, EvidenceSnippet, Hypothesis};
use crate::types::{AppError, AppResult};

pub const SYSTEM_PROMPT: &str = "You are a research summarization agent. You write a concise \
narrative of how a hypothesis evolved over a refinement run and what evidence shaped it.";

const MAX_EVIDENCE_IN_PROMPT: usize = 20;

pub struct LlmSummarizationAgent {
    llm: LLM,
}

impl LlmSummarizationAgent {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    fn build_prompt(evidence: &[EvidenceSnippet], trajectory: &[Hypothesis]) -> String {
        let steps = trajectory
            .iter()
            .map(|h| format!("- iteration {} ({}): {}", h.iteration(), h.origin(), h.text()))
            .collect::<Vec<_>>()
            .join("\n");
        let evidence_block = if evidence.is_empty() {
            "No external evidence was gathered during this run.".to_string()
        } else {
            format_evidence(&evidence[..evidence.len().min(MAX_EVIDENCE_IN_PROMPT)])
        };
        let final_text = trajectory.last().map(|h| h.text()).unwrap_or_default();

        format!(
            r#"Summarize this hypothesis refinement run in 2-3 paragraphs of plain prose.

HYPOTHESIS TRAJECTORY:
{steps}

EVIDENCE CONSULTED:
{evidence}

Explain how the hypothesis changed and why, which evidence mattered most,
and end by restating the final hypothesis verbatim:
"{final_text}""#,
            steps = steps,
            evidence = evidence_block,
            final_text = final_text
        )
    }
}

#[async_trait]
impl SummarizationAgent for LlmSummarizationAgent {
    async fn summarize(&self, evidence: &[EvidenceSnippet], trajectory: &[Hypothesis]) -> AppResult<String> {
        let final_hypothesis = trajectory
            .last()
            .ok_or_else(|| AppError::agent(AgentKind::Summarization, "empty hypothesis trajectory"))?;

        let prompt = Self::build_prompt(evidence, trajectory);
        let params = InvocationParams::new(SYSTEM_PROMPT).with_temperature(0.3);
        let response = invoke_model(&self.llm, AgentKind::Summarization, &prompt, &params).await?;

        let mut summary = response.trim().to_string();
        if !summary.contains(final_hypothesis.text()) {
            summary.push_str(&format!("\n\nFinal hypothesis: {}", final_hypothesis.text()));
        }

        info!(
            trajectory_len = trajectory.len(),
            evidence_count = evidence.len(),
            "Summarized run"
        );
        Ok(summary)
    }
}
