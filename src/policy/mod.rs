pub mod baseline;
pub mod constraint_aware;
pub mod context;
pub mod schedule;
pub mod strategy;

pub use baseline::{AlwaysAcceptPolicy, RandomPolicy};
pub use constraint_aware::ConstraintAwarePolicy;
pub use context::DecisionContext;
pub use schedule::{DecayCurve, ScheduleConfig, SchedulePreset, ToleranceSchedule};
pub use strategy::{DecisionPolicy, Policy, PolicyConfig};
