use std::collections::BTreeMap;

use bouncer::{
    error::AdmissionErrorKind,
    ledger::LedgerSnapshot,
    policy::{ConstraintAwarePolicy, DecisionContext, DecisionPolicy, ToleranceSchedule},
    profile::{Arrival, AttributeProfile, Constraint},
};

fn profile(capacity: u64, fraction: f64) -> AttributeProfile {
    AttributeProfile::new(vec![Constraint::new("x", fraction)], capacity, 1_000)
        .expect("profile should be valid")
}

fn ledger(admitted: u64, with_x: u64) -> LedgerSnapshot {
    LedgerSnapshot {
        admitted_total: admitted,
        rejected_total: 0,
        admitted_with_attribute: BTreeMap::from([("x".to_string(), with_x)]),
    }
}

fn arrival(has_x: bool) -> Arrival {
    Arrival::new(7, BTreeMap::from([("x".to_string(), has_x)]))
}

fn decide(profile: &AttributeProfile, ledger: &LedgerSnapshot, arrival: &Arrival) -> bool {
    let ctx = DecisionContext::new(arrival, ledger, profile);
    ConstraintAwarePolicy::default()
        .decide(&ctx)
        .expect("decision should succeed")
}

#[test]
fn given_forced_regime_when_arrival_lacks_short_attribute_then_rejected() {
    let profile = profile(10, 0.5);
    let ledger = ledger(8, 2);

    assert!(!decide(&profile, &ledger, &arrival(false)));
    assert!(decide(&profile, &ledger, &arrival(true)));
}

#[test]
fn given_shortfall_within_tolerance_when_non_helping_arrival_then_admitted() {
    let profile = profile(100, 0.5);
    let ledger = ledger(10, 4);

    assert!(decide(&profile, &ledger, &arrival(false)));
}

#[test]
fn given_shortfall_beyond_tolerance_when_non_helping_arrival_then_rejected() {
    let profile = profile(100, 0.5);
    let ledger = ledger(10, 1);

    assert!(!decide(&profile, &ledger, &arrival(false)));
    assert!(decide(&profile, &ledger, &arrival(true)));
}

#[test]
fn given_no_short_constraint_when_deciding_then_admitted() {
    let profile = profile(100, 0.5);
    let ledger = ledger(10, 6);

    assert!(decide(&profile, &ledger, &arrival(false)));
}

#[test]
fn given_full_venue_when_deciding_then_rejected() {
    let profile = profile(10, 0.5);
    let ledger = ledger(10, 10);

    assert!(!decide(&profile, &ledger, &arrival(true)));
}

#[test]
fn given_arrival_missing_constrained_attribute_when_deciding_then_malformed() {
    let profile = profile(10, 0.5);
    let ledger = ledger(0, 0);
    let arrival = Arrival::new(3, BTreeMap::from([("other".to_string(), true)]));
    let ctx = DecisionContext::new(&arrival, &ledger, &profile);

    let err = ConstraintAwarePolicy::default()
        .decide(&ctx)
        .expect_err("missing attribute must be reported");
    assert_eq!(err.kind, AdmissionErrorKind::MalformedArrival);
    assert!(err.message.contains('x'));
}

#[test]
fn given_same_context_when_decided_twice_then_same_verdict() {
    let profile = profile(100, 0.5);
    let ledger = ledger(40, 15);
    let arrival = arrival(false);
    let ctx = DecisionContext::new(&arrival, &ledger, &profile);
    let mut policy = ConstraintAwarePolicy::new(ToleranceSchedule::new(0.3, 0.05, 0.2));

    let first = policy.decide(&ctx).expect("decision should succeed");
    let second = policy.decide(&ctx).expect("decision should succeed");
    assert_eq!(first, second);
}

#[test]
fn given_two_short_constraints_in_forced_regime_when_arrival_has_one_then_rejected() {
    let profile = AttributeProfile::new(
        vec![Constraint::new("x", 0.5), Constraint::new("y", 0.5)],
        10,
        100,
    )
    .expect("profile should be valid");
    let ledger = LedgerSnapshot {
        admitted_total: 8,
        rejected_total: 0,
        admitted_with_attribute: BTreeMap::from([("x".to_string(), 2), ("y".to_string(), 3)]),
    };
    let only_x = Arrival::new(
        1,
        BTreeMap::from([("x".to_string(), true), ("y".to_string(), false)]),
    );
    let both = Arrival::new(
        2,
        BTreeMap::from([("x".to_string(), true), ("y".to_string(), true)]),
    );

    assert!(!decide(&profile, &ledger, &only_x));
    assert!(decide(&profile, &ledger, &both));
}
