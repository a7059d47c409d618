use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    error::{AdmissionError, invalid_config},
    policy::{context::DecisionContext, strategy::DecisionPolicy},
};

/// Admits everyone until the venue is full. Ignores constraints entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysAcceptPolicy;

impl DecisionPolicy for AlwaysAcceptPolicy {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError> {
        Ok(ctx.capacity_remaining > 0)
    }

    fn label(&self) -> String {
        "AlwaysAccept".to_string()
    }
}

/// Coin-flip baseline with an explicit seed so runs replay exactly.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    acceptance_rate: f64,
    seed: u64,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(acceptance_rate: f64, seed: u64) -> Result<Self, AdmissionError> {
        if !(0.0..=1.0).contains(&acceptance_rate) {
            return Err(invalid_config(format!(
                "acceptance_rate must lie in [0, 1], got {acceptance_rate}"
            )));
        }

        Ok(Self {
            acceptance_rate,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance_rate
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DecisionPolicy for RandomPolicy {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError> {
        if ctx.capacity_remaining == 0 {
            return Ok(false);
        }
        Ok(self.rng.random_bool(self.acceptance_rate))
    }

    fn label(&self) -> String {
        format!("Random({})", self.acceptance_rate)
    }
}
