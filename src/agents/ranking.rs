// Ranking agent: scores a reflected hypothesis on every ScoreDimension

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{invoke_model, parse_json_response, RankingAgent};
use crate::llm::{InvocationParams, LLM};
use crate::models::{AgentKind, Hypothesis, RankScore, ScoreDimension, SCORE_MAX, SCORE_MIN};
use crate::types::AppResult;

pub const SYSTEM_PROMPT: &str = "You are a hypothesis ranking agent. You score research hypotheses \
strictly and consistently on fixed numeric scales. Respond with JSON only.";

#[derive(Debug, Deserialize)]
struct RankingResponse {
    novelty: f64,
    feasibility: f64,
    evidence_support: f64,
}

pub struct LlmRankingAgent {
    llm: LLM,
}

impl LlmRankingAgent {
    pub fn new(llm: LLM) -> Self {
        Self { llm }
    }

    fn build_prompt(hypothesis: &Hypothesis, rationale: &str) -> String {
        format!(
            r#"Score the hypothesis below.

HYPOTHESIS:
{hypothesis}

REVIEWER RATIONALE:
{rationale}

Score each dimension from {min} (worst) to {max} (best):
- novelty: how original the claim is relative to existing work
- feasibility: how practical it is to test with current methods
- evidence_support: how well the available evidence backs it

OUTPUT FORMAT (respond with ONLY valid JSON, numbers only):
{{
  "novelty": 0.0,
  "feasibility": 0.0,
  "evidence_support": 0.0
}}"#,
            hypothesis = hypothesis.text(),
            rationale = rationale,
            min = SCORE_MIN,
            max = SCORE_MAX
        )
    }
}

#[async_trait]
impl RankingAgent for LlmRankingAgent {
    async fn rank(&self, hypothesis: &Hypothesis, rationale: &str) -> AppResult<RankScore> {
        let prompt = Self::build_prompt(hypothesis, rationale);
        let params = InvocationParams::new(SYSTEM_PROMPT)
            .with_temperature(0.0)
            .with_max_tokens(256);

        let response = invoke_model(&self.llm, AgentKind::Ranking, &prompt, &params).await?;
        let parsed: RankingResponse = parse_json_response(AgentKind::Ranking, &response)?;

        let score = RankScore::new(
            hypothesis,
            [
                (ScoreDimension::Novelty, parsed.novelty),
                (ScoreDimension::Feasibility, parsed.feasibility),
                (ScoreDimension::EvidenceSupport, parsed.evidence_support),
            ],
        )?;

        info!(
            iteration = hypothesis.iteration(),
            novelty = parsed.novelty,
            feasibility = parsed.feasibility,
            evidence_support = parsed.evidence_support,
            aggregate = score.aggregate(),
            "Ranked hypothesis"
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{llm, CannedAdapter};
    use crate::types::AppError;

    fn reflected() -> Hypothesis {
        Hypothesis::new("Clinorotation delays germination", AgentKind::Reflection, 1).unwrap()
    }

    #[tokio::test]
    async fn test_rank_builds_score() {
        let adapter = CannedAdapter::replying(
            r#"{"novelty": 6, "feasibility": 8.5, "evidence_support": 7, "notes": "ignored"}"#,
        );
        let agent = LlmRankingAgent::new(llm(adapter.clone()));
        let hypothesis = reflected();

        let score = agent.rank(&hypothesis, "Evidence 1 supports it").await.unwrap();
        assert_eq!(score.hypothesis_id(), hypothesis.id());
        assert_eq!(score.iteration(), 1);
        assert_eq!(score.get(ScoreDimension::Feasibility), Some(8.5));
        assert!((score.aggregate() - 21.5 / 3.0).abs() < 1e-9);
        assert!(adapter.last_prompt().contains("Evidence 1 supports it"));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        let adapter = CannedAdapter::replying(r#"{"novelty": 15, "feasibility": 8, "evidence_support": 7}"#);
        let agent = LlmRankingAgent::new(llm(adapter));

        let err = agent.rank(&reflected(), "r").await.unwrap_err();
        match err {
            AppError::InvalidScore { dimension, value, .. } => {
                assert_eq!(dimension, "novelty");
                assert_eq!(value, 15.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_dimension_is_agent_error() {
        let adapter = CannedAdapter::replying(r#"{"novelty": 5, "feasibility": 8}"#);
        let agent = LlmRankingAgent::new(llm(adapter));
        let err = agent.rank(&reflected(), "r").await.unwrap_err();
        assert!(matches!(err, AppError::AgentInvocation { ref agent, .. } if agent == "ranking"));
    }
}
