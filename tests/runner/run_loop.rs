use std::collections::BTreeMap;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use bouncer::{
    policy::{AlwaysAcceptPolicy, Policy, PolicyConfig},
    profile::Arrival,
    runner::{RunLoop, RunLoopConfig, RunState},
    session::{BoundaryErrorKind, ScriptedFailure, ScriptedSession},
};

use crate::support::{
    MiscountingSession, constraint_aware_run, five_seat_session, local_arrivals, start,
};

fn aborted_reason(state: &RunState) -> &str {
    match state {
        RunState::AbortedError { reason } => reason,
        other => panic!("expected aborted run, got {other:?}"),
    }
}

#[tokio::test]
async fn given_five_seat_local_scenario_when_run_then_fills_with_no_rejections() {
    let session = five_seat_session("LNLLNLN");
    let mut run = RunLoop::start(session, &PolicyConfig::default(), 0, RunLoopConfig::default())
        .await
        .expect("run should start");

    let state = run.run(CancellationToken::new()).await;

    assert_eq!(state, RunState::CompletedFull);
    let ledger = run.ledger();
    assert_eq!(ledger.admitted_total, 5);
    assert_eq!(ledger.rejected_total, 0);
    assert_eq!(ledger.admitted_with("local"), 3);
    assert!((ledger.current_fraction("local") - 0.6).abs() < 1e-12);
    assert_eq!(run.session_id(), Some("scripted"));
    assert_eq!(run.session().verdicts().len(), 5);
}

#[tokio::test]
async fn given_no_constraints_when_always_accepting_then_first_arrivals_fill_the_venue() {
    let start = start(&[], 3, 10);
    let session = ScriptedSession::new(start.clone(), local_arrivals("NNNNN"));
    let profile = start.to_profile().expect("profile should build");
    let mut run = RunLoop::new(
        profile,
        Policy::AlwaysAccept(AlwaysAcceptPolicy),
        session,
        RunLoopConfig::default(),
    );

    assert_eq!(run.run(CancellationToken::new()).await, RunState::CompletedFull);
    assert_eq!(run.ledger().admitted_total, 3);
    assert_eq!(run.ledger().rejected_total, 0);
    assert_eq!(run.session().remaining_arrivals(), 2);
}

#[tokio::test]
async fn given_single_transient_fetch_failure_when_run_then_retried_once_and_completes() {
    let session = five_seat_session("LNLLN").with_fetch_failure(ScriptedFailure {
        on_call: 1,
        kind: BoundaryErrorKind::Transient,
    });
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        session,
        RunLoopConfig::default(),
    );

    assert_eq!(run.run(CancellationToken::new()).await, RunState::CompletedFull);
    assert_eq!(run.session().fetch_calls(), 6);
}

#[tokio::test]
async fn given_two_consecutive_transient_fetch_failures_when_run_then_aborted() {
    let session = five_seat_session("LNLLN")
        .with_fetch_failure(ScriptedFailure {
            on_call: 1,
            kind: BoundaryErrorKind::Transient,
        })
        .with_fetch_failure(ScriptedFailure {
            on_call: 2,
            kind: BoundaryErrorKind::Transient,
        });
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        session,
        RunLoopConfig::default(),
    );

    let state = run.run(CancellationToken::new()).await;
    assert!(aborted_reason(&state).contains("fetch failed"));
    assert_eq!(run.session().fetch_calls(), 2);
    assert_eq!(run.ledger().processed_total(), 0);
}

#[tokio::test]
async fn given_permanent_fetch_failure_when_run_then_aborted_without_retry() {
    let session = five_seat_session("LNLLN").with_fetch_failure(ScriptedFailure {
        on_call: 1,
        kind: BoundaryErrorKind::Permanent,
    });
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        session,
        RunLoopConfig::default(),
    );

    run.run(CancellationToken::new()).await;
    assert_eq!(run.session().fetch_calls(), 1);
}

#[tokio::test]
async fn given_transient_submit_failure_when_run_then_aborted_without_resubmit() {
    let session = five_seat_session("LNLLN").with_submit_failure(ScriptedFailure {
        on_call: 2,
        kind: BoundaryErrorKind::Transient,
    });
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        session,
        RunLoopConfig::default(),
    );

    let state = run.run(CancellationToken::new()).await;

    assert!(aborted_reason(&state).contains("submit failed"));
    assert_eq!(run.session().submit_calls(), 2);
    assert_eq!(run.ledger().admitted_total, 1);
}

#[tokio::test]
async fn given_arrival_missing_attribute_when_run_then_aborted_before_submit() {
    let start = start(&[("local", 3)], 5, 10);
    let arrivals = vec![Arrival::new(
        0,
        BTreeMap::from([("young".to_string(), true)]),
    )];
    let session = ScriptedSession::new(start.clone(), arrivals);
    let mut run = constraint_aware_run(&start, session, RunLoopConfig::default());

    let state = run.run(CancellationToken::new()).await;

    assert!(aborted_reason(&state).contains("missing constrained attributes"));
    assert_eq!(run.session().submit_calls(), 0);
    assert_eq!(run.ledger().processed_total(), 0);
}

#[tokio::test]
async fn given_arrivals_run_out_early_when_run_then_aborted_as_exhausted() {
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        five_seat_session("LL"),
        RunLoopConfig::default(),
    );

    let state = run.run(CancellationToken::new()).await;

    assert_eq!(aborted_reason(&state), "arrival stream exhausted");
    assert_eq!(run.ledger().admitted_total, 2);
}

#[tokio::test]
async fn given_provider_finishes_before_ledger_when_run_then_aborted() {
    // provider thinks the venue holds two, the profile says five
    let session = ScriptedSession::new(start(&[("local", 1)], 2, 10), local_arrivals("LLLLL"));
    let mut run = constraint_aware_run(
        &start(&[("local", 3)], 5, 10),
        session,
        RunLoopConfig::default(),
    );

    let state = run.run(CancellationToken::new()).await;

    assert!(aborted_reason(&state).contains("Completed"));
    assert_eq!(run.ledger().admitted_total, 2);
}

#[tokio::test]
async fn given_provider_counts_disagree_when_run_then_ledger_is_not_advanced() {
    let start = start(&[("local", 3)], 5, 10);
    let session = MiscountingSession {
        inner: ScriptedSession::new(start.clone(), local_arrivals("LLLLL")),
    };
    let mut run = constraint_aware_run(&start, session, RunLoopConfig::default());

    let state = run.run(CancellationToken::new()).await;

    assert!(aborted_reason(&state).contains("provider reports 2 admitted"));
    assert_eq!(run.ledger().processed_total(), 0);
}

#[tokio::test]
async fn given_cancelled_token_when_run_then_stops_between_steps() {
    let start = start(&[("local", 3)], 5, 10);
    let mut run = constraint_aware_run(&start, five_seat_session("LNLLN"), RunLoopConfig::default());

    assert_eq!(run.run_steps(2).await, RunState::Running);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let state = run.run(cancel).await;

    assert_eq!(state, RunState::Cancelled);
    let ledger = run.ledger();
    assert_eq!(ledger.processed_total(), 2);
    assert_eq!(run.session().verdicts().len(), 2);
    assert_eq!(run.progress().state, RunState::Cancelled);
}

#[tokio::test]
async fn given_subscriber_when_run_then_latest_snapshot_is_terminal() {
    let start = start(&[("local", 3)], 5, 10);
    let mut run = constraint_aware_run(&start, five_seat_session("LNLLN"), RunLoopConfig::default());
    let receiver = run.subscribe();

    assert_eq!(receiver.borrow().step, 0);
    run.run(CancellationToken::new()).await;

    let snapshot = receiver.borrow().clone();
    assert_eq!(snapshot.step, 5);
    assert_eq!(snapshot.state, RunState::CompletedFull);
    assert_eq!(snapshot.constraints.len(), 1);
    assert_eq!(snapshot.constraints[0].shortfall, 0.0);
}

#[tokio::test]
async fn given_history_enabled_when_run_then_one_record_per_arrival() {
    let start = start(&[("local", 3)], 5, 10);
    let config = RunLoopConfig {
        record_history: true,
        ..RunLoopConfig::default()
    };
    let mut run = constraint_aware_run(&start, five_seat_session("LNLLN"), config);

    run.run(CancellationToken::new()).await;

    let history = run.history();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].admitted_before, 0);
    assert_eq!(history[4].admitted_after, 5);
    assert!(history.iter().all(|record| record.admitted));
}

#[tokio::test]
async fn given_terminal_run_when_stepped_again_then_nothing_changes() {
    let start = start(&[("local", 3)], 5, 10);
    let mut run = constraint_aware_run(&start, five_seat_session("LNLLNL"), RunLoopConfig::default());

    run.run(CancellationToken::new()).await;
    let fetches = run.session().fetch_calls();
    assert_eq!(run.step().await, RunState::CompletedFull);
    assert_eq!(run.session().fetch_calls(), fetches);
}

proptest! {
    #[test]
    fn run_terminates_within_capacity_plus_budget_steps(
        pattern in prop::collection::vec(any::<bool>(), 20),
        min_local in 1u64..=10,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime should build");
        let arrivals: String = pattern.iter().map(|local| if *local { 'L' } else { 'N' }).collect();
        let start = start(&[("local", min_local)], 10, 10);
        let session = ScriptedSession::new(start.clone(), local_arrivals(&arrivals));
        let mut run = constraint_aware_run(&start, session, RunLoopConfig::default());

        let state = runtime.block_on(run.run(CancellationToken::new()));
        let ledger = run.ledger();

        prop_assert!(ledger.processed_total() <= 20);
        prop_assert!(matches!(
            state,
            RunState::CompletedFull | RunState::AbortedRejectionLimit
        ));
        prop_assert!(ledger.admitted_total <= 10);
    }
}
