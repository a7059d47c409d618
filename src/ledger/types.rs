use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::{AttributeId, AttributeProfile, Constraint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    CompletedFull,
    AbortedRejectionLimit,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Immutable copy of the ledger counters. This is the only ledger view the
/// decision policy ever sees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub admitted_total: u64,
    pub rejected_total: u64,
    pub admitted_with_attribute: BTreeMap<AttributeId, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintProgress {
    pub attribute: AttributeId,
    pub minimum_fraction: f64,
    pub admitted_with_attribute: u64,
    pub current_fraction: f64,
    pub shortfall: f64,
}

impl LedgerSnapshot {
    pub fn processed_total(&self) -> u64 {
        self.admitted_total + self.rejected_total
    }

    pub fn admitted_with(&self, attribute: &str) -> u64 {
        self.admitted_with_attribute
            .get(attribute)
            .copied()
            .unwrap_or(0)
    }

    pub fn current_fraction(&self, attribute: &str) -> f64 {
        if self.admitted_total == 0 {
            return 0.0;
        }
        self.admitted_with(attribute) as f64 / self.admitted_total as f64
    }

    pub fn shortfall(&self, constraint: &Constraint) -> f64 {
        (constraint.minimum_fraction - self.current_fraction(&constraint.attribute)).max(0.0)
    }

    /// Signed distance above the minimum; negative while the constraint is short.
    pub fn margin(&self, constraint: &Constraint) -> f64 {
        self.current_fraction(&constraint.attribute) - constraint.minimum_fraction
    }

    pub fn status(&self, profile: &AttributeProfile) -> RunStatus {
        if self.admitted_total >= profile.target_capacity() {
            RunStatus::CompletedFull
        } else if self.rejected_total >= profile.rejection_budget() {
            RunStatus::AbortedRejectionLimit
        } else {
            RunStatus::Running
        }
    }

    pub fn constraint_progress(&self, constraints: &[Constraint]) -> Vec<ConstraintProgress> {
        constraints
            .iter()
            .map(|constraint| ConstraintProgress {
                attribute: constraint.attribute.clone(),
                minimum_fraction: constraint.minimum_fraction,
                admitted_with_attribute: self.admitted_with(&constraint.attribute),
                current_fraction: self.current_fraction(&constraint.attribute),
                shortfall: self.shortfall(constraint),
            })
            .collect()
    }
}
