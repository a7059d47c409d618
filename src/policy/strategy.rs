use serde::{Deserialize, Serialize};

use crate::{
    error::AdmissionError,
    policy::{
        baseline::{AlwaysAcceptPolicy, RandomPolicy},
        constraint_aware::ConstraintAwarePolicy,
        context::DecisionContext,
        schedule::ScheduleConfig,
    },
};

pub trait DecisionPolicy: Send {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError>;

    fn label(&self) -> String;
}

/// The closed set of strategies a run can be built with.
#[derive(Debug, Clone)]
pub enum Policy {
    ConstraintAware(ConstraintAwarePolicy),
    AlwaysAccept(AlwaysAcceptPolicy),
    Random(RandomPolicy),
}

impl DecisionPolicy for Policy {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<bool, AdmissionError> {
        match self {
            Policy::ConstraintAware(policy) => policy.decide(ctx),
            Policy::AlwaysAccept(policy) => policy.decide(ctx),
            Policy::Random(policy) => policy.decide(ctx),
        }
    }

    fn label(&self) -> String {
        match self {
            Policy::ConstraintAware(policy) => policy.label(),
            Policy::AlwaysAccept(policy) => policy.label(),
            Policy::Random(policy) => policy.label(),
        }
    }
}

fn default_acceptance_rate() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    ConstraintAware {
        #[serde(default)]
        schedule: ScheduleConfig,
    },
    AlwaysAccept,
    Random {
        #[serde(default = "default_acceptance_rate")]
        acceptance_rate: f64,
        #[serde(default)]
        seed: u64,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::ConstraintAware {
            schedule: ScheduleConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// Builds a fresh policy instance. `run_index` offsets the random seed so
    /// sibling runs in a batch draw independent but reproducible streams.
    pub fn build(&self, run_index: u64) -> Result<Policy, AdmissionError> {
        match self {
            PolicyConfig::ConstraintAware { schedule } => Ok(Policy::ConstraintAware(
                ConstraintAwarePolicy::new(schedule.resolve()?),
            )),
            PolicyConfig::AlwaysAccept => Ok(Policy::AlwaysAccept(AlwaysAcceptPolicy)),
            PolicyConfig::Random {
                acceptance_rate,
                seed,
            } => Ok(Policy::Random(RandomPolicy::new(
                *acceptance_rate,
                seed.wrapping_add(run_index),
            )?)),
        }
    }
}
