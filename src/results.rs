use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AdmissionError, persistence_error},
    ledger::LedgerSnapshot,
    profile::{AttributeId, AttributeProfile, ProfileOutlook},
    runner::{DecisionRecord, RunState},
};

const SUMMARY_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOutcome {
    pub attribute: AttributeId,
    pub minimum_fraction: f64,
    pub required_count: u64,
    pub admitted_with_attribute: u64,
    pub final_fraction: f64,
    /// `min(actual / required, 1)`.
    pub satisfaction: f64,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub acceptance_rate: f64,
    pub rejection_rate: f64,
    pub completion_rate: f64,
    pub avg_constraint_satisfaction: f64,
    pub min_constraint_satisfaction: f64,
    pub constraints_met: usize,
    pub total_constraints: usize,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub version: u64,
    pub run_id: String,
    pub policy: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub scenario: Option<u8>,
    pub state: RunState,
    pub steps: u64,
    pub target_capacity: u64,
    pub rejection_budget: u64,
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub constraints: Vec<ConstraintOutcome>,
    pub metrics: RunMetrics,
    /// Pre-run estimates from provider statistics, when the provider sent any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlook: Option<ProfileOutlook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<DecisionRecord>>,
}

impl RunSummary {
    pub fn build(
        policy: String,
        session_id: Option<String>,
        profile: &AttributeProfile,
        ledger: &LedgerSnapshot,
        state: RunState,
        steps: u64,
        history: Option<Vec<DecisionRecord>>,
    ) -> Self {
        let target_capacity = profile.target_capacity();
        let constraints: Vec<ConstraintOutcome> = profile
            .constraints()
            .iter()
            .map(|constraint| {
                let required_count = constraint.required_count(target_capacity);
                let actual = ledger.admitted_with(&constraint.attribute);
                let satisfaction = if required_count == 0 {
                    1.0
                } else {
                    (actual as f64 / required_count as f64).min(1.0)
                };
                ConstraintOutcome {
                    attribute: constraint.attribute.clone(),
                    minimum_fraction: constraint.minimum_fraction,
                    required_count,
                    admitted_with_attribute: actual,
                    final_fraction: ledger.current_fraction(&constraint.attribute),
                    satisfaction,
                    met: actual >= required_count,
                }
            })
            .collect();

        let metrics = RunMetrics::compute(ledger, target_capacity, &constraints, &state);

        Self {
            version: SUMMARY_VERSION,
            run_id: Uuid::now_v7().to_string(),
            policy,
            session_id,
            scenario: None,
            state,
            steps,
            target_capacity,
            rejection_budget: profile.rejection_budget(),
            admitted_total: ledger.admitted_total,
            rejected_total: ledger.rejected_total,
            constraints,
            metrics,
            outlook: profile.outlook(),
            history,
        }
    }

    pub fn with_scenario(mut self, scenario: u8) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// `results_<policy>_scenario<n>_<run_id>.json`, with the policy label
    /// reduced to filename-safe characters.
    pub fn file_name(&self) -> String {
        let label: String = self
            .policy
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        let scenario = self
            .scenario
            .map(|scenario| scenario.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("results_{label}_scenario{scenario}_{}.json", self.run_id)
    }
}

impl RunMetrics {
    fn compute(
        ledger: &LedgerSnapshot,
        target_capacity: u64,
        constraints: &[ConstraintOutcome],
        state: &RunState,
    ) -> Self {
        let processed = ledger.processed_total();
        let (acceptance_rate, rejection_rate) = if processed == 0 {
            (0.0, 0.0)
        } else {
            (
                ledger.admitted_total as f64 / processed as f64,
                ledger.rejected_total as f64 / processed as f64,
            )
        };

        let scores = constraints.iter().map(|outcome| outcome.satisfaction);
        let (avg, min) = if constraints.is_empty() {
            (1.0, 1.0)
        } else {
            (
                scores.clone().sum::<f64>() / constraints.len() as f64,
                scores.fold(f64::INFINITY, f64::min),
            )
        };
        let constraints_met = constraints.iter().filter(|outcome| outcome.met).count();

        Self {
            acceptance_rate,
            rejection_rate,
            completion_rate: ledger.admitted_total as f64 / target_capacity.max(1) as f64,
            avg_constraint_satisfaction: avg,
            min_constraint_satisfaction: min,
            constraints_met,
            total_constraints: constraints.len(),
            success: *state == RunState::CompletedFull && constraints_met == constraints.len(),
        }
    }
}

/// Directory of persisted run summaries.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes through a temp file and rename so readers never see a partial
    /// summary.
    pub fn save(&self, summary: &RunSummary) -> Result<PathBuf, AdmissionError> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            persistence_error(format!(
                "failed to create results directory '{}': {err}",
                self.dir.display()
            ))
        })?;

        let path = self.dir.join(summary.file_name());
        let tmp_path = path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|err| {
            persistence_error(format!(
                "failed to create results temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;
        {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, summary).map_err(|err| {
                persistence_error(format!(
                    "failed to serialize run summary '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.write_all(b"\n").map_err(|err| {
                persistence_error(format!(
                    "failed to finalize run summary '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.flush().map_err(|err| {
                persistence_error(format!(
                    "failed to flush run summary '{}': {err}",
                    tmp_path.display()
                ))
            })?;
        }

        fs::rename(&tmp_path, &path).map_err(|err| {
            persistence_error(format!(
                "failed to move run summary into '{}': {err}",
                path.display()
            ))
        })?;

        tracing::info!(
            target: "results",
            path = %path.display(),
            run_id = %summary.run_id,
            state = summary.state.label(),
            "run_summary_saved"
        );
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<RunSummary, AdmissionError> {
        let content = fs::read_to_string(path).map_err(|err| {
            persistence_error(format!(
                "failed to read run summary '{}': {err}",
                path.display()
            ))
        })?;
        let summary: RunSummary = serde_json::from_str(&content).map_err(|err| {
            persistence_error(format!(
                "failed to parse run summary '{}': {err}",
                path.display()
            ))
        })?;
        if summary.version != SUMMARY_VERSION {
            return Err(persistence_error(format!(
                "unsupported run summary version {} at '{}'",
                summary.version,
                path.display()
            )));
        }
        Ok(summary)
    }
}
