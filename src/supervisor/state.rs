//! Run state
//!
//! `RunState` is owned by exactly one supervisor run. Records are
//! append-only, contiguous from 0 and chained (each input is the previous
//! output); every mutation checks this and fails with `InvalidState`
//! rather than corrupting the history. Once finalized the state is frozen.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EvidenceSnippet, Hypothesis, IterationRecord, RankScore, StopReason, Topic};
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finalized {
        reason: StopReason,
        finished_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    run_id: Uuid,
    topic: Topic,
    started_at: DateTime<Utc>,
    initial: Option<Hypothesis>,
    records: Vec<IterationRecord>,
    current: Option<Hypothesis>,
    status: RunStatus,
}

impl RunState {
    pub fn new(topic: Topic) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic,
            started_at: Utc::now(),
            initial: None,
            records: Vec::new(),
            current: None,
            status: RunStatus::Running,
        }
    }

    fn ensure_running(&self) -> AppResult<()> {
        match self.status {
            RunStatus::Running => Ok(()),
            RunStatus::Finalized { .. } => Err(AppError::InvalidState(format!(
                "run {} is finalized and cannot be modified",
                self.run_id
            ))),
        }
    }

    /// Installs the generated hypothesis; allowed once, before any record
    pub fn set_initial(&mut self, hypothesis: Hypothesis) -> AppResult<()> {
        self.ensure_running()?;
        if self.initial.is_some() {
            return Err(AppError::InvalidState("initial hypothesis already set".to_string()));
        }
        if hypothesis.iteration() != 0 {
            return Err(AppError::InvalidState(format!(
                "initial hypothesis must be at iteration 0, got {}",
                hypothesis.iteration()
            )));
        }
        self.initial = Some(hypothesis.clone());
        self.current = Some(hypothesis);
        Ok(())
    }

    pub fn append(&mut self, record: IterationRecord) -> AppResult<()> {
        self.ensure_running()?;

        let expected = self.records.len();
        if record.iteration != expected {
            return Err(AppError::InvalidState(format!(
                "expected iteration {}, got {}",
                expected, record.iteration
            )));
        }
        match &self.current {
            Some(current) if *current == record.input_hypothesis => {}
            Some(_) => {
                return Err(AppError::InvalidState(format!(
                    "iteration {} input is not the current hypothesis",
                    record.iteration
                )))
            }
            None => return Err(AppError::InvalidState("no initial hypothesis".to_string())),
        }
        if record.score.hypothesis_id() != record.reflected_hypothesis.id()
            || record.score.iteration() != record.iteration
        {
            return Err(AppError::InvalidState(format!(
                "iteration {} score is not attached to its reflected hypothesis",
                record.iteration
            )));
        }
        if record.reflected_hypothesis.iteration() != record.iteration
            || record.output_hypothesis.iteration() != record.iteration + 1
        {
            return Err(AppError::InvalidState(format!(
                "iteration {} hypotheses carry inconsistent indices",
                record.iteration
            )));
        }

        self.current = Some(record.output_hypothesis.clone());
        self.records.push(record);
        Ok(())
    }

    /// Freezes the state. A second call is an error.
    pub fn finalize(&mut self, reason: StopReason) -> AppResult<()> {
        self.ensure_running()?;
        self.status = RunStatus::Finalized {
            reason,
            finished_at: Utc::now(),
        };
        Ok(())
    }

    /// Checks a state that did not come from `append`, e.g. one read back
    /// from disk: it must be finalized and its records must replay cleanly.
    pub fn verify(&self) -> AppResult<()> {
        if !self.is_finalized() {
            return Err(AppError::InvalidState(format!(
                "run {} was never finalized",
                self.run_id
            )));
        }

        let mut replay = RunState {
            run_id: self.run_id,
            topic: self.topic.clone(),
            started_at: self.started_at,
            initial: None,
            records: Vec::with_capacity(self.records.len()),
            current: None,
            status: RunStatus::Running,
        };
        if let Some(initial) = &self.initial {
            replay.set_initial(initial.clone())?;
        }
        for record in &self.records {
            replay.append(record.clone())?;
        }

        if replay.current != self.current {
            return Err(AppError::InvalidState(format!(
                "run {} current hypothesis does not match its records",
                self.run_id
            )));
        }
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn current(&self) -> Option<&Hypothesis> {
        self.current.as_ref()
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.status, RunStatus::Finalized { .. })
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.status {
            RunStatus::Finalized { reason, .. } => Some(reason),
            RunStatus::Running => None,
        }
    }

    pub fn score_history(&self) -> Vec<RankScore> {
        self.records.iter().map(|r| r.score.clone()).collect()
    }

    pub fn aggregates(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.score.aggregate()).collect()
    }

    /// Evidence of every iteration, first occurrence kept
    pub fn accumulated_evidence(&self) -> Vec<EvidenceSnippet> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .flat_map(|r| r.evidence.iter())
            .filter(|snippet| seen.insert(snippet.dedup_key()))
            .cloned()
            .collect()
    }

    /// Initial hypothesis followed by each iteration's evolved output
    pub fn trajectory(&self) -> Vec<Hypothesis> {
        self.initial
            .iter()
            .cloned()
            .chain(self.records.iter().map(|r| r.output_hypothesis.clone()))
            .collect()
    }
}

/// Why a run aborted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Error kind, e.g. "agent_invocation" or "invalid_score"
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub message: String,
    /// Iteration in progress when the failure happened; None during generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<usize>,
}

impl RunFailure {
    pub fn from_error(error: &AppError, iteration: Option<usize>) -> Self {
        let agent = match error {
            AppError::AgentInvocation { agent, .. } => Some(agent.clone()),
            AppError::InvalidScore { .. } => Some("ranking".to_string()),
            _ => None,
        };
        Self {
            kind: error.kind().to_string(),
            agent,
            message: error.to_string(),
            iteration,
        }
    }
}

/// Final output of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub state: RunState,
    pub summary: Option<String>,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunResult {
    pub fn records(&self) -> &[IterationRecord] {
        self.state.records()
    }

    pub fn final_hypothesis(&self) -> Option<&Hypothesis> {
        self.state.current()
    }
}
