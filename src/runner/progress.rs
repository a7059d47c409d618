use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ledger::{ConstraintProgress, LedgerSnapshot},
    profile::{AttributeId, AttributeProfile},
    runner::state::RunState,
};

/// Point-in-time view of a run, published after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub step: u64,
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub constraints: Vec<ConstraintProgress>,
    pub state: RunState,
}

impl ProgressSnapshot {
    pub fn capture(
        step: u64,
        ledger: &LedgerSnapshot,
        profile: &AttributeProfile,
        state: RunState,
    ) -> Self {
        Self {
            step,
            admitted_total: ledger.admitted_total,
            rejected_total: ledger.rejected_total,
            constraints: ledger.constraint_progress(profile.constraints()),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub step: u64,
    pub person_index: u64,
    pub attributes: BTreeMap<AttributeId, bool>,
    pub admitted: bool,
    pub admitted_before: u64,
    pub rejected_before: u64,
    pub admitted_after: u64,
    pub rejected_after: u64,
}
