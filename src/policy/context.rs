use crate::{
    error::{AdmissionError, malformed_arrival},
    ledger::LedgerSnapshot,
    profile::{Arrival, AttributeProfile, Constraint},
};

/// Everything a policy may look at for one arrival. Built fresh per step and
/// never persisted.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub arrival: &'a Arrival,
    pub ledger: &'a LedgerSnapshot,
    pub constraints: &'a [Constraint],
    pub target_capacity: u64,
    pub capacity_remaining: u64,
    pub rejections_remaining: u64,
}

impl<'a> DecisionContext<'a> {
    pub fn new(
        arrival: &'a Arrival,
        ledger: &'a LedgerSnapshot,
        profile: &'a AttributeProfile,
    ) -> Self {
        Self {
            arrival,
            ledger,
            constraints: profile.constraints(),
            target_capacity: profile.target_capacity(),
            capacity_remaining: profile
                .target_capacity()
                .saturating_sub(ledger.admitted_total),
            rejections_remaining: profile
                .rejection_budget()
                .saturating_sub(ledger.rejected_total),
        }
    }

    /// Share of the venue already filled, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target_capacity == 0 {
            return 1.0;
        }
        (self.ledger.admitted_total as f64 / self.target_capacity as f64).min(1.0)
    }

    pub fn validate_arrival(&self) -> Result<(), AdmissionError> {
        let missing: Vec<&str> = self
            .constraints
            .iter()
            .filter(|constraint| self.arrival.has(&constraint.attribute).is_none())
            .map(|constraint| constraint.attribute.as_str())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(malformed_arrival(format!(
            "arrival #{} is missing constrained attributes: {}",
            self.arrival.person_index,
            missing.join(", ")
        )))
    }

    pub fn arrival_has(&self, attribute: &str) -> bool {
        self.arrival.has(attribute).unwrap_or(false)
    }

    /// Constraints currently below their minimum, paired with the shortfall.
    pub fn short_constraints(&self) -> impl Iterator<Item = (&'a Constraint, f64)> + 'a {
        let ledger = self.ledger;
        self.constraints.iter().filter_map(move |constraint| {
            let shortfall = ledger.shortfall(constraint);
            (shortfall > 0.0).then_some((constraint, shortfall))
        })
    }
}
