use std::{path::PathBuf, sync::Arc};

use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AdmissionError, AdmissionErrorKind, cancelled, invariant_violation},
    policy::PolicyConfig,
    results::{ResultsStore, RunSummary},
    runner::{RunLoop, RunLoopConfig},
    session::SessionPort,
};

/// How many runs to execute and how many may be in flight at once.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub runs: u64,
    pub max_concurrent_runs: usize,
    pub policy: PolicyConfig,
    pub run_config: RunLoopConfig,
    pub scenario: Option<u8>,
}

#[derive(Debug)]
pub struct BatchEntry {
    pub run_index: u64,
    pub outcome: Result<RunSummary, AdmissionError>,
}

/// Executes `plan.runs` isolated runs. `factory` builds a fresh session per
/// run index; nothing else is shared between runs. Entries come back ordered
/// by run index and a failed run never stops its siblings. Runs still queued
/// when `cancel` fires end with a `Cancelled` error and never call
/// `SessionPort::start`.
#[tracing::instrument(
    name = "run_batch",
    target = "batch",
    skip(plan, factory, cancel),
    fields(runs = plan.runs, max_concurrent_runs = plan.max_concurrent_runs)
)]
pub async fn run_batch<F>(plan: BatchPlan, factory: F, cancel: CancellationToken) -> Vec<BatchEntry>
where
    F: Fn(u64) -> Result<Box<dyn SessionPort>, AdmissionError>,
{
    let semaphore = Arc::new(Semaphore::new(plan.max_concurrent_runs.max(1)));
    let mut tasks = JoinSet::new();
    let mut entries = Vec::with_capacity(plan.runs as usize);

    for run_index in 0..plan.runs {
        let session = match factory(run_index) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(
                    target: "batch",
                    run_index = run_index,
                    error = %err,
                    "session_factory_failed"
                );
                entries.push(BatchEntry {
                    run_index,
                    outcome: Err(err),
                });
                continue;
            }
        };

        let semaphore = Arc::clone(&semaphore);
        let policy = plan.policy.clone();
        let run_config = plan.run_config;
        let scenario = plan.scenario;
        let cancel = cancel.clone();
        tasks.spawn(async move {
            // a queued run must not open a provider session once cancelled
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => Some(permit),
            };
            let outcome = match permit {
                None => Err(cancelled(format!("run {run_index} cancelled before start"))),
                Some(Err(_)) => Err(invariant_violation("batch semaphore closed")),
                Some(Ok(_permit)) if cancel.is_cancelled() => {
                    Err(cancelled(format!("run {run_index} cancelled before start")))
                }
                Some(Ok(_permit)) => {
                    execute_run(session, &policy, run_index, run_config, scenario, cancel).await
                }
            };
            BatchEntry { run_index, outcome }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(target: "batch", error = %err, "batch_task_join_failed");
            }
        }
    }

    entries.sort_by_key(|entry| entry.run_index);
    fill_lost_runs(&mut entries, plan.runs);

    let succeeded = entries.iter().filter(|entry| entry.outcome.is_ok()).count();
    let skipped = entries
        .iter()
        .filter(|entry| {
            matches!(&entry.outcome, Err(err) if err.kind == AdmissionErrorKind::Cancelled)
        })
        .count();
    tracing::info!(
        target: "batch",
        runs = plan.runs,
        succeeded = succeeded,
        cancelled = skipped,
        failed = entries.len() - succeeded - skipped,
        "batch_finished"
    );
    entries
}

/// What happened to each batch entry once its summary was persisted.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub saved: Vec<(u64, PathBuf)>,
    pub failed: Vec<(u64, AdmissionError)>,
    pub cancelled: Vec<u64>,
}

impl BatchReport {
    /// True when at least one run was attempted and none produced a saved
    /// summary.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.saved.is_empty()
    }
}

/// Saves every successful summary. A failed save is logged and reported for
/// that run only; the remaining summaries are still written.
pub fn persist_entries(store: &ResultsStore, entries: &[BatchEntry]) -> BatchReport {
    let mut report = BatchReport::default();
    for entry in entries {
        let summary = match &entry.outcome {
            Ok(summary) => summary,
            Err(err) if err.kind == AdmissionErrorKind::Cancelled => {
                report.cancelled.push(entry.run_index);
                continue;
            }
            Err(err) => {
                report.failed.push((entry.run_index, err.clone()));
                continue;
            }
        };

        match store.save(summary) {
            Ok(path) => report.saved.push((entry.run_index, path)),
            Err(err) => {
                tracing::error!(
                    target: "batch",
                    run_index = entry.run_index,
                    error = %err,
                    "run_summary_save_failed"
                );
                report.failed.push((entry.run_index, err));
            }
        }
    }
    report
}

async fn execute_run(
    session: Box<dyn SessionPort>,
    policy: &PolicyConfig,
    run_index: u64,
    run_config: RunLoopConfig,
    scenario: Option<u8>,
    cancel: CancellationToken,
) -> Result<RunSummary, AdmissionError> {
    let mut run = RunLoop::start(session, policy, run_index, run_config).await?;
    run.run(cancel).await;
    let summary = run.into_summary();
    Ok(match scenario {
        Some(scenario) => summary.with_scenario(scenario),
        None => summary,
    })
}

// A panicked task leaves no entry; report it instead of dropping the index.
fn fill_lost_runs(entries: &mut Vec<BatchEntry>, runs: u64) {
    if entries.len() as u64 == runs {
        return;
    }
    let present: Vec<u64> = entries.iter().map(|entry| entry.run_index).collect();
    for run_index in 0..runs {
        if present.binary_search(&run_index).is_err() {
            entries.push(BatchEntry {
                run_index,
                outcome: Err(invariant_violation(format!(
                    "run {run_index} terminated without a result"
                ))),
            });
        }
    }
    entries.sort_by_key(|entry| entry.run_index);
}
