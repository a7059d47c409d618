use crate::{
    error::AdmissionError,
    policy::{context::DecisionContext, schedule::ToleranceSchedule, strategy::DecisionPolicy},
};

/// Deterministic shortfall-priority policy.
///
/// Two regimes:
/// - forced: remaining seats are no longer enough to fix some shortfall
///   unless every admitted arrival carries it, so only arrivals carrying every
///   short attribute get in;
/// - banded: a non-helping arrival gets in while each short constraint is
///   still within the current tolerance of its minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintAwarePolicy {
    schedule: ToleranceSchedule,
}

impl ConstraintAwarePolicy {
    pub fn new(schedule: ToleranceSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &ToleranceSchedule {
        &self.schedule
    }

    pub fn evaluate(&self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError> {
        ctx.validate_arrival()?;

        if ctx.capacity_remaining == 0 {
            return Ok(false);
        }

        let short: Vec<_> = ctx.short_constraints().collect();
        if short.is_empty() {
            return Ok(true);
        }

        let capacity_remaining = ctx.capacity_remaining as f64;
        let target_capacity = ctx.target_capacity as f64;
        let forced = short
            .iter()
            .any(|(_, shortfall)| capacity_remaining <= shortfall * target_capacity);

        if forced {
            let verdict = short
                .iter()
                .all(|(constraint, _)| ctx.arrival_has(&constraint.attribute));
            tracing::debug!(
                target: "policy",
                person_index = ctx.arrival.person_index,
                capacity_remaining = ctx.capacity_remaining,
                short_constraints = short.len(),
                verdict,
                "forced_regime_verdict"
            );
            return Ok(verdict);
        }

        let tolerance = self.schedule.tolerance(ctx.progress());
        Ok(short.iter().all(|(constraint, _)| {
            ctx.arrival_has(&constraint.attribute) || ctx.ledger.margin(constraint) > -tolerance
        }))
    }
}

impl Default for ConstraintAwarePolicy {
    fn default() -> Self {
        Self::new(ToleranceSchedule::default())
    }
}

impl DecisionPolicy for ConstraintAwarePolicy {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError> {
        self.evaluate(ctx)
    }

    fn label(&self) -> String {
        format!("ConstraintAware({})", self.schedule.label())
    }
}
