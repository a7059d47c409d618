use std::collections::BTreeMap;

use crate::{
    error::{AdmissionError, invariant_violation},
    ledger::types::{LedgerSnapshot, RunStatus},
    profile::{AttributeId, AttributeProfile, Constraint},
};

/// Authoritative admit/reject bookkeeping for one run. Counters only move up;
/// a verdict cannot be taken back once recorded.
#[derive(Debug, Clone)]
pub struct ConstraintLedger {
    counts: LedgerSnapshot,
}

impl ConstraintLedger {
    pub fn new(profile: &AttributeProfile) -> Self {
        let admitted_with_attribute = profile
            .constraints()
            .iter()
            .map(|constraint| (constraint.attribute.clone(), 0))
            .collect();

        Self {
            counts: LedgerSnapshot {
                admitted_total: 0,
                rejected_total: 0,
                admitted_with_attribute,
            },
        }
    }

    pub fn record(
        &mut self,
        attributes: &BTreeMap<AttributeId, bool>,
        admitted: bool,
    ) -> Result<&LedgerSnapshot, AdmissionError> {
        if !admitted {
            self.counts.rejected_total = self
                .counts
                .rejected_total
                .checked_add(1)
                .ok_or_else(|| invariant_violation("rejected_total overflow"))?;
            return Ok(&self.counts);
        }

        // overflow is checked up front so a failed record leaves no partial update
        let admitted_total = self
            .counts
            .admitted_total
            .checked_add(1)
            .ok_or_else(|| invariant_violation("admitted_total overflow"))?;

        for (attribute, _) in attributes.iter().filter(|(_, present)| **present) {
            let count = self
                .counts
                .admitted_with_attribute
                .entry(attribute.clone())
                .or_insert(0);
            *count += 1;
        }
        self.counts.admitted_total = admitted_total;

        Ok(&self.counts)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.counts.clone()
    }

    pub fn status(&self, profile: &AttributeProfile) -> RunStatus {
        self.counts.status(profile)
    }

    pub fn admitted_total(&self) -> u64 {
        self.counts.admitted_total
    }

    pub fn rejected_total(&self) -> u64 {
        self.counts.rejected_total
    }

    pub fn admitted_with(&self, attribute: &str) -> u64 {
        self.counts.admitted_with(attribute)
    }

    pub fn current_fraction(&self, attribute: &str) -> f64 {
        self.counts.current_fraction(attribute)
    }

    pub fn shortfall(&self, constraint: &Constraint) -> f64 {
        self.counts.shortfall(constraint)
    }
}
