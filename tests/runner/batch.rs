use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use uuid::Uuid;
use tokio_util::sync::CancellationToken;

use bouncer::{
    batch::{BatchPlan, persist_entries, run_batch},
    error::{AdmissionErrorKind, invalid_config},
    policy::PolicyConfig,
    profile::Arrival,
    results::ResultsStore,
    runner::{RunLoopConfig, RunState},
    session::{BoundaryError, SessionAck, SessionPort, SessionStart},
};

use crate::support::{StartCountingSession, five_seat_session};

fn plan(runs: u64, policy: PolicyConfig) -> BatchPlan {
    BatchPlan {
        runs,
        max_concurrent_runs: 2,
        policy,
        run_config: RunLoopConfig::default(),
        scenario: Some(1),
    }
}

#[tokio::test]
async fn given_independent_runs_when_batched_then_results_are_isolated_and_ordered() {
    let entries = run_batch(
        plan(4, PolicyConfig::default()),
        |_| Ok(Box::new(five_seat_session("LNLLNLN")) as Box<dyn SessionPort>),
        CancellationToken::new(),
    )
    .await;

    assert_eq!(entries.len(), 4);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.run_index, index as u64);
        let summary = entry.outcome.as_ref().expect("run should succeed");
        assert_eq!(summary.state, RunState::CompletedFull);
        assert_eq!(summary.admitted_total, 5);
        assert_eq!(summary.rejected_total, 0);
        assert_eq!(summary.scenario, Some(1));
    }
}

#[tokio::test]
async fn given_one_failing_factory_call_when_batched_then_siblings_still_finish() {
    let entries = run_batch(
        plan(3, PolicyConfig::AlwaysAccept),
        |run_index| {
            if run_index == 1 {
                return Err(invalid_config("no session for run 1"));
            }
            Ok(Box::new(five_seat_session("NNNNN")) as Box<dyn SessionPort>)
        },
        CancellationToken::new(),
    )
    .await;

    assert_eq!(entries.len(), 3);
    assert!(entries[0].outcome.is_ok());
    let err = entries[1].outcome.as_ref().expect_err("run 1 should fail");
    assert_eq!(err.kind, AdmissionErrorKind::InvalidConfig);
    let last = entries[2].outcome.as_ref().expect("run 2 should succeed");
    assert_eq!(last.policy, "AlwaysAccept");
    assert_eq!(last.state, RunState::CompletedFull);
}

#[tokio::test]
async fn given_cancelled_token_when_batched_then_no_session_is_opened() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let starts = Arc::new(AtomicUsize::new(0));

    let entries = run_batch(
        BatchPlan {
            max_concurrent_runs: 1,
            ..plan(5, PolicyConfig::default())
        },
        |_| {
            Ok(Box::new(StartCountingSession {
                inner: five_seat_session("LNLLN"),
                starts: Arc::clone(&starts),
            }) as Box<dyn SessionPort>)
        },
        cancel,
    )
    .await;

    assert_eq!(starts.load(Ordering::SeqCst), 0);
    assert_eq!(entries.len(), 5);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.run_index, index as u64);
        let err = entry.outcome.as_ref().expect_err("run should not start");
        assert_eq!(err.kind, AdmissionErrorKind::Cancelled);
    }
}

#[tokio::test]
async fn given_cancel_during_first_run_when_batched_then_queued_runs_never_start() {
    let cancel = CancellationToken::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let trigger = cancel.clone();

    let entries = run_batch(
        BatchPlan {
            max_concurrent_runs: 1,
            ..plan(3, PolicyConfig::AlwaysAccept)
        },
        |run_index| {
            let inner = five_seat_session("LNLLN");
            if run_index == 0 {
                return Ok(Box::new(CancellingSession {
                    inner: StartCountingSession {
                        inner,
                        starts: Arc::clone(&starts),
                    },
                    cancel: trigger.clone(),
                }) as Box<dyn SessionPort>);
            }
            Ok(Box::new(StartCountingSession {
                inner,
                starts: Arc::clone(&starts),
            }) as Box<dyn SessionPort>)
        },
        cancel,
    )
    .await;

    assert_eq!(starts.load(Ordering::SeqCst), 1);
    let first = entries[0].outcome.as_ref().expect("first run should summarize");
    assert_eq!(first.state, RunState::Cancelled);
    assert_eq!(first.steps, 1);
    for entry in &entries[1..] {
        let err = entry.outcome.as_ref().expect_err("queued run should not start");
        assert_eq!(err.kind, AdmissionErrorKind::Cancelled);
    }
}

#[tokio::test]
async fn given_one_unwritable_summary_when_persisted_then_other_runs_are_still_saved() {
    let entries = run_batch(
        plan(3, PolicyConfig::AlwaysAccept),
        |run_index| {
            if run_index == 2 {
                return Err(invalid_config("no session for run 2"));
            }
            Ok(Box::new(five_seat_session("NNNNN")) as Box<dyn SessionPort>)
        },
        CancellationToken::new(),
    )
    .await;

    let dir = std::env::temp_dir().join(format!("bouncer-batch-test-{}", Uuid::now_v7()));
    let store = ResultsStore::new(dir.clone());
    let first = entries[0].outcome.as_ref().expect("run 0 should succeed");
    // a directory squatting on the temp path makes this one save fail
    let blocked = dir.join(first.file_name()).with_extension("tmp");
    std::fs::create_dir_all(&blocked).expect("blocking dir should be created");

    let report = persist_entries(&store, &entries);

    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.saved[0].0, 1);
    assert!(report.saved[0].1.exists());
    let failed: Vec<(u64, AdmissionErrorKind)> = report
        .failed
        .iter()
        .map(|(run_index, err)| (*run_index, err.kind))
        .collect();
    assert_eq!(
        failed,
        vec![
            (0, AdmissionErrorKind::Persistence),
            (2, AdmissionErrorKind::InvalidConfig),
        ]
    );
    assert!(!report.all_failed());

    let _ = std::fs::remove_dir_all(&dir);
}

/// Cancels the batch as soon as its first verdict is acknowledged.
struct CancellingSession<S> {
    inner: S,
    cancel: CancellationToken,
}

#[async_trait]
impl<S: SessionPort> SessionPort for CancellingSession<S> {
    async fn start(&mut self) -> Result<SessionStart, BoundaryError> {
        self.inner.start().await
    }

    async fn fetch_next(&mut self) -> Result<Option<Arrival>, BoundaryError> {
        self.inner.fetch_next().await
    }

    async fn submit_verdict(&mut self, admitted: bool) -> Result<SessionAck, BoundaryError> {
        let ack = self.inner.submit_verdict(admitted).await;
        self.cancel.cancel();
        ack
    }
}
