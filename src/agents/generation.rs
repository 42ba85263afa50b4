// Generation agent: proposes the first hypothesis of a run

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{invoke_model, parse_json_response, GenerationAgent};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, Hypothesis, Topic};
use crate::types::AppResult;

pub const SYSTEM_PROMPT: &str = "You are a hypothesis generation agent. You propose a single novel, \
specific and testable scientific hypothesis for a research topic. Respond with JSON only.";

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    hypothesis: String,
}

pub struct LlmGenerationAgent {
    llm: LLM,
}

impl LlmGenerationAgent {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    fn build_prompt(topic: &Topic) -> String {
        format!(
            r#"Propose one research hypothesis for the topic below.

RESEARCH TOPIC:
{topic}

The hypothesis must:
1. Make a clear, falsifiable claim
2. Name the variables involved and the expected direction of the effect
3. Be specific enough that an experiment could test it

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "hypothesis": "One or two sentences stating the hypothesis"
}}"#,
            topic = topic
        )
    }
}

#[async_trait]
impl GenerationAgent for LlmGenerationAgent {
    async fn generate(&self, topic: &Topic) -> AppResult<Hypothesis> {
        let prompt = Self::build_prompt(topic);
        let params = InvocationParams::new(SYSTEM_PROMPT).with_temperature(0.8);

        let response = invoke_model(&self.llm, AgentKind::Generation, &prompt, &params).await?;
        let parsed: GenerationResponse = parse_json_response(AgentKind::Generation, &response)?;
        let hypothesis = Hypothesis::new(parsed.hypothesis, AgentKind::Generation, 0)?;

        info!(topic = %topic, hypothesis_id = %hypothesis.id(), "Generated initial hypothesis");
        Ok(hypothesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{llm, CannedAdapter};
    use crate::types::AppError;

    #[tokio::test]
    async fn test_generate_parses_hypothesis() {
        let adapter = CannedAdapter::replying(
            "```json\n{\"hypothesis\": \"Microgravity delays radicle emergence in Arabidopsis seeds\"}\n```",
        );
        let agent = LlmGenerationAgent::new(llm(adapter.clone()));
        let topic = Topic::new("effect of microgravity on seed germination").unwrap();

        let hypothesis = agent.generate(&topic).await.unwrap();
        assert_eq!(hypothesis.text(), "Microgravity delays radicle emergence in Arabidopsis seeds");
        assert_eq!(hypothesis.origin(), AgentKind::Generation);
        assert_eq!(hypothesis.iteration(), 0);
        assert!(adapter.last_prompt().contains("effect of microgravity on seed germination"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_hypothesis() {
        let adapter = CannedAdapter::replying("{\"hypothesis\": \"  \"}");
        let agent = LlmGenerationAgent::new(llm(adapter));
        let err = agent.generate(&Topic::new("soil microbes").unwrap()).await.unwrap_err();
        assert!(matches!(err, AppError::AgentInvocation { ref agent, .. } if agent == "generation"));
    }

    #[tokio::test]
    async fn test_model_failure_is_attributed_to_generation() {
        let adapter = CannedAdapter::new(vec![Err(AppError::ModelInvocation("HTTP 500".to_string()))]);
        let agent = LlmGenerationAgent::new(llm(adapter));
        let err = agent.generate(&Topic::new("soil microbes").unwrap()).await.unwrap_err();
        match err {
            AppError::AgentInvocation { agent, message } => {
                assert_eq!(agent, "generation");
                assert!(message.contains("HTTP 500"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
