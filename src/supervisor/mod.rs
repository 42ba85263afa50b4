//! Supervisor
//!
//! Owns the refinement loop of one run:
//!
//! ```text
//! Generating → GatheringEvidence → Reflecting → Ranking → Evolving ─┐
//!                     ▲                                             │
//!                     └──────────── stop policy: continue ──────────┤
//!                                                                   ▼
//!                                          Summarizing → Stopped(reason)
//! ```
//!
//! Each phase transition is one step of [`RunDriver::step`]. An agent
//! failure moves straight to `Stopped(Error)` keeping completed records;
//! provider failures only shrink that iteration's evidence. Cancellation is
//! checked before each iteration starts.

pub mod state;
pub mod stopping;

pub use state::{RunFailure, RunResult, RunState, RunStatus};
pub use stopping::{is_plateau, StopPolicy};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::agents::{AgentSet, KeywordSelector};
use crate::config::{Config, RunConfig};
use crate::llm::{LLMProviderConfig, LLM};
use crate::models::{AgentKind, EvidenceSnippet, IterationRecord, RankScore, Reflection, StopReason, Topic};
use crate::search::{derive_query, EvidenceClient};
use crate::types::{AppError, AppResult};

/// Loop phases. Data produced mid-iteration travels inside the phase.
#[derive(Debug)]
enum Phase {
    Generating,
    GatheringEvidence {
        iteration: usize,
    },
    Reflecting {
        iteration: usize,
        query: String,
        evidence: Vec<EvidenceSnippet>,
    },
    Ranking {
        iteration: usize,
        query: String,
        evidence: Vec<EvidenceSnippet>,
        reflection: Reflection,
    },
    Evolving {
        iteration: usize,
        query: String,
        evidence: Vec<EvidenceSnippet>,
        reflection: Reflection,
        score: RankScore,
    },
    Summarizing(StopReason),
    Stopped(StopReason),
}

impl Phase {
    fn iteration(&self) -> Option<usize> {
        match self {
            Phase::GatheringEvidence { iteration }
            | Phase::Reflecting { iteration, .. }
            | Phase::Ranking { iteration, .. }
            | Phase::Evolving { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}

pub struct Supervisor {
    agents: AgentSet,
    evidence: EvidenceClient,
}

impl Supervisor {
    pub fn new(agents: AgentSet, evidence: EvidenceClient) -> Self {
        Self { agents, evidence }
    }

    /// Model-backed agents and every provider the configuration enables
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let api_key = config.llm.active_api_key().ok_or_else(|| {
            AppError::Configuration(format!(
                "No API key configured for LLM provider {}",
                config.llm.default_provider
            ))
        })?;

        let llm = LLM::new(LLMProviderConfig {
            provider: config.llm.default_provider,
            api_key,
            model: config.llm.default_model.clone(),
        })?
        .with_default_temperature(config.llm.temperature);

        let mut agents = AgentSet::llm_backed(llm);
        if config.search.keyword_selection {
            agents = agents.with_selector(Arc::new(KeywordSelector::default()));
        }

        let evidence = EvidenceClient::from_config(&config.search);
        if evidence.is_empty() {
            warn!("No evidence providers configured; reflections will run without evidence");
        }

        Ok(Self::new(agents, evidence))
    }

    pub fn evidence_client(&self) -> &EvidenceClient {
        &self.evidence
    }

    pub async fn run(&self, topic: &str, config: &RunConfig) -> AppResult<RunResult> {
        self.run_with_cancellation(topic, config, CancellationToken::new()).await
    }

    /// Runs the loop to completion. Only configuration problems are returned
    /// as `Err`; every other failure is reported inside the `RunResult`.
    pub async fn run_with_cancellation(
        &self,
        topic: &str,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> AppResult<RunResult> {
        config.validate_run()?;
        let topic = Topic::new(topic)?;

        let mut driver = RunDriver {
            supervisor: self,
            config,
            policy: StopPolicy::from_config(config),
            state: RunState::new(topic),
            cache: HashMap::new(),
            cancel,
            summary: None,
            failure: None,
        };

        info!(
            run_id = %driver.state.run_id(),
            topic = %driver.state.topic(),
            max_iterations = config.max_iterations,
            threshold = ?config.score_improvement_threshold,
            strategy = ?config.evidence_query_strategy,
            "Starting hypothesis refinement run"
        );

        let mut phase = Phase::Generating;
        loop {
            if let Phase::Stopped(reason) = phase {
                return driver.finish(reason);
            }
            let iteration = phase.iteration();
            phase = match driver.step(phase).await {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        run_id = %driver.state.run_id(),
                        iteration = ?iteration,
                        error = %e,
                        "Run aborted"
                    );
                    driver.failure = Some(RunFailure::from_error(&e, iteration));
                    Phase::Stopped(StopReason::Error)
                }
            };
        }
    }
}

/// Mutable context of one run; dropped when the run returns
struct RunDriver<'a> {
    supervisor: &'a Supervisor,
    config: &'a RunConfig,
    policy: StopPolicy,
    state: RunState,
    /// Candidates per query, for this run only
    cache: HashMap<String, Vec<EvidenceSnippet>>,
    cancel: CancellationToken,
    summary: Option<String>,
    failure: Option<RunFailure>,
}

impl RunDriver<'_> {
    /// Bounds an agent call by the per-call timeout
    async fn call<T>(&self, agent: AgentKind, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        match tokio::time::timeout(self.config.call_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::agent(
                agent,
                format!("timed out after {}s", self.config.call_timeout_secs),
            )),
        }
    }

    async fn step(&mut self, phase: Phase) -> AppResult<Phase> {
        let supervisor = self.supervisor;
        let agents = &supervisor.agents;

        match phase {
            Phase::Generating => {
                if self.cancel.is_cancelled() {
                    return Ok(Phase::Stopped(StopReason::Cancelled));
                }
                let hypothesis = self
                    .call(AgentKind::Generation, agents.generation.generate(self.state.topic()))
                    .await?;
                self.state.set_initial(hypothesis)?;
                Ok(Phase::GatheringEvidence { iteration: 0 })
            }

            Phase::GatheringEvidence { iteration } => {
                if self.cancel.is_cancelled() {
                    info!(iteration, "Run cancelled at iteration boundary");
                    return Ok(Phase::Stopped(StopReason::Cancelled));
                }
                let current = self
                    .state
                    .current()
                    .cloned()
                    .ok_or_else(|| AppError::InvalidState("no current hypothesis".to_string()))?;

                let query = derive_query(self.config.evidence_query_strategy, self.state.topic(), &current);
                let candidates = self.candidates(&query).await;
                let evidence = self
                    .call(AgentKind::EvidenceSelection, agents.selector.select(&current, &candidates))
                    .await?;

                debug!(
                    iteration,
                    query = %query,
                    candidates = candidates.len(),
                    selected = evidence.len(),
                    "Evidence ready"
                );
                Ok(Phase::Reflecting {
                    iteration,
                    query,
                    evidence,
                })
            }

            Phase::Reflecting {
                iteration,
                query,
                evidence,
            } => {
                let current = self
                    .state
                    .current()
                    .cloned()
                    .ok_or_else(|| AppError::InvalidState("no current hypothesis".to_string()))?;
                let reflection = self
                    .call(AgentKind::Reflection, agents.reflection.reflect(&current, &evidence))
                    .await?;
                Ok(Phase::Ranking {
                    iteration,
                    query,
                    evidence,
                    reflection,
                })
            }

            Phase::Ranking {
                iteration,
                query,
                evidence,
                reflection,
            } => {
                let score = self
                    .call(
                        AgentKind::Ranking,
                        agents.ranking.rank(&reflection.hypothesis, &reflection.rationale),
                    )
                    .await?;
                Ok(Phase::Evolving {
                    iteration,
                    query,
                    evidence,
                    reflection,
                    score,
                })
            }

            Phase::Evolving {
                iteration,
                query,
                evidence,
                reflection,
                score,
            } => {
                let mut history = self.state.score_history();
                history.push(score.clone());
                let evolved = self
                    .call(
                        AgentKind::Evolution,
                        agents
                            .evolution
                            .evolve(&reflection.hypothesis, &history, &reflection.rationale),
                    )
                    .await?;

                let input_hypothesis = self
                    .state
                    .current()
                    .cloned()
                    .ok_or_else(|| AppError::InvalidState("no current hypothesis".to_string()))?;
                let aggregate = score.aggregate();
                self.state.append(IterationRecord {
                    iteration,
                    input_hypothesis,
                    evidence,
                    evidence_query: query,
                    reflected_hypothesis: reflection.hypothesis,
                    rationale: reflection.rationale,
                    score,
                    output_hypothesis: evolved,
                    completed_at: Utc::now(),
                })?;

                info!(
                    run_id = %self.state.run_id(),
                    iteration,
                    aggregate,
                    "Iteration completed"
                );

                match self.policy.evaluate(&self.state.aggregates()) {
                    Some(reason) => Ok(Phase::Summarizing(reason)),
                    None => Ok(Phase::GatheringEvidence {
                        iteration: iteration + 1,
                    }),
                }
            }

            Phase::Summarizing(reason) => {
                let evidence = self.state.accumulated_evidence();
                let trajectory = self.state.trajectory();
                let summary = self
                    .call(
                        AgentKind::Summarization,
                        agents.summarization.summarize(&evidence, &trajectory),
                    )
                    .await?;
                self.summary = Some(summary);
                Ok(Phase::Stopped(reason))
            }

            Phase::Stopped(reason) => Ok(Phase::Stopped(reason)),
        }
    }

    /// Candidate evidence for `query`. Provider failures are logged and
    /// leave the result partial; only complete gatherings are cached.
    async fn candidates(&mut self, query: &str) -> Vec<EvidenceSnippet> {
        if let Some(cached) = self.cache.get(query) {
            debug!(query = %query, snippets = cached.len(), "Evidence cache hit");
            return cached.clone();
        }

        let gathering = self
            .supervisor
            .evidence
            .gather(query, self.config.max_results_per_provider, self.config.call_timeout())
            .await;

        if !gathering.is_complete() {
            warn!(
                query = %query,
                failed_providers = gathering.failures.len(),
                "Continuing with partial evidence"
            );
        } else {
            self.cache.insert(query.to_string(), gathering.snippets.clone());
        }
        gathering.snippets
    }

    fn finish(mut self, reason: StopReason) -> AppResult<RunResult> {
        self.state.finalize(reason)?;

        info!(
            run_id = %self.state.run_id(),
            stop_reason = %reason,
            iterations = self.state.records().len(),
            "Run finished"
        );

        Ok(RunResult {
            state: self.state,
            summary: self.summary,
            stop_reason: reason,
            failure: self.failure,
        })
    }
}
