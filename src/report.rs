//! Run reporting: score metrics, a CLI table and JSON persistence

use std::collections::BTreeMap;
use std::path::Path;

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::ScoreDimension;
use crate::supervisor::{RunResult, RunState};
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub iteration: usize,
    pub aggregate: f64,
    pub dimensions: BTreeMap<ScoreDimension, f64>,
    /// Change from the previous iteration's aggregate
    pub delta: Option<f64>,
    pub evidence_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub rows: Vec<IterationMetrics>,
    pub best_iteration: Option<usize>,
    /// Last aggregate minus first aggregate
    pub improvement: Option<f64>,
}

impl RunMetrics {
    pub fn from_state(state: &RunState) -> Self {
        let mut rows = Vec::with_capacity(state.records().len());
        let mut previous: Option<f64> = None;

        for record in state.records() {
            let aggregate = record.score.aggregate();
            rows.push(IterationMetrics {
                iteration: record.iteration,
                aggregate,
                dimensions: record.score.dimensions().clone(),
                delta: previous.map(|p| aggregate - p),
                evidence_count: record.evidence.len(),
            });
            previous = Some(aggregate);
        }

        // earliest iteration wins ties
        let best_iteration = rows
            .iter()
            .fold(None::<&IterationMetrics>, |best, row| match best {
                Some(b) if b.aggregate >= row.aggregate => Some(b),
                _ => Some(row),
            })
            .map(|row| row.iteration);

        let improvement = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => Some(last.aggregate - first.aggregate),
            _ => None,
        };

        Self {
            rows,
            best_iteration,
            improvement,
        }
    }

    /// Renders the per-iteration rows as a table followed by the
    /// best-iteration and improvement footer
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(
            ["Iter", "Aggregate", "Novelty", "Feasibility", "Evidence", "Delta", "Snippets"]
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for row in &self.rows {
            let dim = |d: ScoreDimension| {
                row.dimensions
                    .get(&d)
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "-".to_string())
            };
            let delta = row
                .delta
                .map(|d| format!("{:+.2}", d))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(row.iteration),
                Cell::new(format!("{:.2}", row.aggregate)),
                Cell::new(dim(ScoreDimension::Novelty)),
                Cell::new(dim(ScoreDimension::Feasibility)),
                Cell::new(dim(ScoreDimension::EvidenceSupport)),
                Cell::new(delta),
                Cell::new(row.evidence_count),
            ]);
        }

        let mut lines = vec![table.to_string()];
        if let Some(best) = self.best_iteration {
            lines.push(format!("best iteration: {}", best));
        }
        if let Some(improvement) = self.improvement {
            lines.push(format!("overall improvement: {:+.2}", improvement));
        }
        lines.join("\n")
    }
}

/// Writes `result` as pretty JSON
pub fn save_run(path: impl AsRef<Path>, result: &RunResult) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), run_id = %result.state.run_id(), "Saved run result");
    Ok(())
}

/// Reads a saved result back, rejecting states that are not finalized or
/// whose records do not form a valid chain
pub fn load_run(path: impl AsRef<Path>) -> AppResult<RunResult> {
    let contents = std::fs::read_to_string(path)?;
    let result: RunResult = serde_json::from_str(&contents)?;

    result.state.verify()?;
    if result.state.stop_reason() != Some(result.stop_reason) {
        return Err(AppError::InvalidState(format!(
            "run {} stop reason {:?} disagrees with its state",
            result.state.run_id(),
            result.stop_reason
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentKind, EvidenceSnippet, Hypothesis, IterationRecord, RankScore, StopReason, Topic};
    use chrono::Utc;

    fn state_with(aggregates: &[f64]) -> RunState {
        let mut state = RunState::new(Topic::new("seed germination").unwrap());
        let mut input = Hypothesis::new("h0", AgentKind::Generation, 0).unwrap();
        state.set_initial(input.clone()).unwrap();
        for (i, value) in aggregates.iter().enumerate() {
            let reflected = Hypothesis::new(format!("r{}", i), AgentKind::Reflection, i).unwrap();
            let score = RankScore::new(
                &reflected,
                [
                    (ScoreDimension::Novelty, *value),
                    (ScoreDimension::Feasibility, *value),
                    (ScoreDimension::EvidenceSupport, *value),
                ],
            )
            .unwrap();
            let output = Hypothesis::new(format!("h{}", i + 1), AgentKind::Evolution, i + 1).unwrap();
            state
                .append(IterationRecord {
                    iteration: i,
                    input_hypothesis: input.clone(),
                    evidence: vec![EvidenceSnippet::new("arxiv", format!("paper {}", i), "q"); i],
                    evidence_query: "q".to_string(),
                    reflected_hypothesis: reflected,
                    rationale: "r".to_string(),
                    score,
                    output_hypothesis: output.clone(),
                    completed_at: Utc::now(),
                })
                .unwrap();
            input = output;
        }
        state
    }

    #[test]
    fn test_metrics_from_state() {
        let metrics = RunMetrics::from_state(&state_with(&[5.0, 7.0, 6.5]));
        assert_eq!(metrics.rows.len(), 3);
        assert_eq!(metrics.rows[0].delta, None);
        assert_eq!(metrics.rows[1].delta, Some(2.0));
        assert_eq!(metrics.rows[2].delta, Some(-0.5));
        assert_eq!(metrics.rows[2].evidence_count, 2);
        assert_eq!(metrics.best_iteration, Some(1));
        assert_eq!(metrics.improvement, Some(1.5));
    }

    #[test]
    fn test_best_iteration_prefers_earliest_tie() {
        let metrics = RunMetrics::from_state(&state_with(&[6.0, 6.0]));
        assert_eq!(metrics.best_iteration, Some(0));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = RunMetrics::from_state(&state_with(&[]));
        assert!(metrics.rows.is_empty());
        assert_eq!(metrics.best_iteration, None);
        assert_eq!(metrics.improvement, None);
        assert!(!metrics.render_table().contains("best iteration"));
    }

    #[test]
    fn test_render_table() {
        let table = RunMetrics::from_state(&state_with(&[5.0, 7.0])).render_table();
        assert!(table.contains("Aggregate"));
        assert!(table.contains("Feasibility"));

        let row = table
            .lines()
            .find(|line| line.contains("7.00"))
            .expect("row for iteration 1");
        assert!(row.contains("+2.00"));
        assert!(row.contains("7.0"));

        let first = table
            .lines()
            .find(|line| line.contains("5.00"))
            .expect("row for iteration 0");
        assert!(!first.contains('+'));

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[lines.len() - 2], "best iteration: 1");
        assert_eq!(lines[lines.len() - 1], "overall improvement: +2.00");
    }

    #[test]
    fn test_save_and_load_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("run.json");

        let mut state = state_with(&[5.0, 6.0]);
        state.finalize(StopReason::ExhaustedIterations).unwrap();
        let result = RunResult {
            state,
            summary: Some("summary".to_string()),
            stop_reason: StopReason::ExhaustedIterations,
            failure: None,
        };

        save_run(&path, &result).unwrap();
        let loaded = load_run(&path).unwrap();
        assert_eq!(loaded.state.run_id(), result.state.run_id());
        assert_eq!(loaded.records(), result.records());
        assert_eq!(loaded.stop_reason, StopReason::ExhaustedIterations);
        assert!(loaded.state.is_finalized());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"stop_reason\": \"exhausted-iterations\""));
    }

    fn saved_result(state: RunState, stop_reason: StopReason) -> RunResult {
        RunResult {
            state,
            summary: None,
            stop_reason,
            failure: None,
        }
    }

    #[test]
    fn test_load_rejects_running_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("running.json");
        save_run(&path, &saved_result(state_with(&[5.0]), StopReason::ExhaustedIterations)).unwrap();

        let err = load_run(&path).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(ref msg) if msg.contains("never finalized")));
    }

    #[test]
    fn test_load_rejects_broken_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tampered.json");
        let mut state = state_with(&[5.0, 6.0]);
        state.finalize(StopReason::ExhaustedIterations).unwrap();
        save_run(&path, &saved_result(state, StopReason::ExhaustedIterations)).unwrap();

        // renumber the second record so the sequence has a gap
        let mut raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["state"]["records"][1]["iteration"] = serde_json::json!(5);
        std::fs::write(&path, raw.to_string()).unwrap();

        let err = load_run(&path).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(ref msg) if msg.contains("expected iteration 1")));
    }

    #[test]
    fn test_load_rejects_mismatched_stop_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.json");
        let mut state = state_with(&[5.0]);
        state.finalize(StopReason::Cancelled).unwrap();
        save_run(&path, &saved_result(state, StopReason::Plateau)).unwrap();

        assert!(matches!(load_run(&path), Err(AppError::InvalidState(_))));
    }
}
