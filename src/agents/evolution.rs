// Evolution agent: proposes the next hypothesis from the score trajectory

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{invoke_model, parse_json_response, EvolutionAgent};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, Hypothesis, RankScore};
use crate::types::AppResult;

pub const SYSTEM_PROMPT: &str = "You are a hypothesis evolution agent. Given a hypothesis, its score \
history and a reviewer rationale, you propose an improved successor hypothesis. Respond with JSON only.";

#[derive(Debug, Deserialize)]
struct EvolutionResponse {
    hypothesis: String,
}

pub struct LlmEvolutionAgent {
    llm: LLM,
}

impl LlmEvolutionAgent {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    /// True when the latest aggregate did not beat the previous one
    pub fn is_stalling(score_history: &[RankScore]) -> bool {
        match score_history {
            [.., previous, latest] => latest.aggregate() <= previous.aggregate(),
            _ => false,
        }
    }

    fn format_history(score_history: &[RankScore]) -> String {
        if score_history.is_empty() {
            return "No scores yet.".to_string();
        }
        score_history
            .iter()
            .map(|score| {
                let dims = score
                    .dimensions()
                    .iter()
                    .map(|(dim, value)| format!("{}={:.1}", dim, value))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- iteration {}: aggregate {:.2} ({})", score.iteration(), score.aggregate(), dims)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn build_prompt(hypothesis: &Hypothesis, score_history: &[RankScore], rationale: &str) -> String {
        let direction = if Self::is_stalling(score_history) {
            "The score did not improve on the last iteration. Take a clearly different angle: \
change the mechanism, the organism or the measured outcome rather than rewording the claim."
        } else {
            "Build on what improved the score while strengthening the weakest dimension."
        };

        format!(
            r#"Evolve the hypothesis below into a better successor.

CURRENT HYPOTHESIS:
{hypothesis}

SCORE HISTORY:
{history}

REVIEWER RATIONALE:
{rationale}

GUIDANCE:
{direction}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "hypothesis": "The evolved hypothesis"
}}"#,
            hypothesis = hypothesis.text(),
            history = Self::format_history(score_history),
            rationale = rationale,
            direction = direction
        )
    }
}

#[async_trait]
impl EvolutionAgent for LlmEvolutionAgent {
    async fn evolve(
        &self,
        hypothesis: &Hypothesis,
        score_history: &[RankScore],
        rationale: &str,
    ) -> AppResult<Hypothesis> {
        let stalling = Self::is_stalling(score_history);
        let prompt = Self::build_prompt(hypothesis, score_history, rationale);
        let params = InvocationParams::new(SYSTEM_PROMPT).with_temperature(if stalling { 0.95 } else { 0.7 });

        let response = invoke_model(&self.llm, AgentKind::Evolution, &prompt, &params).await?;
        let parsed: EvolutionResponse = parse_json_response(AgentKind::Evolution, &response)?;
        let evolved = Hypothesis::new(parsed.hypothesis, AgentKind::Evolution, hypothesis.iteration() + 1)?;

        info!(
            from_iteration = hypothesis.iteration(),
            stalling,
            hypothesis_id = %evolved.id(),
            "Evolved hypothesis"
        );
        Ok(evolved)
    }
}
