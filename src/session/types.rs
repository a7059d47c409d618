use serde::{Deserialize, Serialize};

use crate::{
    error::AdmissionError,
    profile::{AttributeId, AttributeProfile, AttributeStatistics, Constraint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Running,
    Completed,
    Failed,
}

impl ProviderStatus {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(ProviderStatus::Running),
            "completed" => Some(ProviderStatus::Completed),
            "failed" => Some(ProviderStatus::Failed),
            _ => None,
        }
    }
}

/// Constraint as the provider states it: an absolute head count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub attribute: AttributeId,
    pub min_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    pub constraints: Vec<ConstraintSpec>,
    pub target_capacity: u64,
    pub rejection_budget: u64,
    #[serde(default)]
    pub statistics: AttributeStatistics,
}

impl SessionStart {
    pub fn to_profile(&self) -> Result<AttributeProfile, AdmissionError> {
        let constraints = self
            .constraints
            .iter()
            .map(|spec| {
                Constraint::from_min_count(
                    spec.attribute.clone(),
                    spec.min_count,
                    self.target_capacity,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let profile =
            AttributeProfile::new(constraints, self.target_capacity, self.rejection_budget)?;
        if self.statistics.is_empty() {
            return Ok(profile);
        }
        Ok(profile.with_statistics(self.statistics.clone()))
    }
}

/// Provider acknowledgement for one verdict. Counts are optional because not
/// every provider reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAck {
    pub status: ProviderStatus,
    #[serde(default)]
    pub admitted_count: Option<u64>,
    #[serde(default)]
    pub rejected_count: Option<u64>,
}
