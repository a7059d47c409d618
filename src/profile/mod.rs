pub mod statistics;
pub mod types;

pub use statistics::AttributeStatistics;
pub use types::{
    Arrival, AttributeId, AttributeProfile, Constraint, ConstraintOutlook, ProfileOutlook,
};
