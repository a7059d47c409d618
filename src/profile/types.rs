use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AdmissionError, invalid_profile},
    profile::statistics::AttributeStatistics,
};

pub type AttributeId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arrival {
    pub person_index: u64,
    pub attributes: BTreeMap<AttributeId, bool>,
}

impl Arrival {
    pub fn new(person_index: u64, attributes: BTreeMap<AttributeId, bool>) -> Self {
        Self {
            person_index,
            attributes,
        }
    }

    /// `None` when the attribute is absent from the vector.
    pub fn has(&self, attribute: &str) -> Option<bool> {
        self.attributes.get(attribute).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub attribute: AttributeId,
    pub minimum_fraction: f64,
}

impl Constraint {
    pub fn new(attribute: impl Into<AttributeId>, minimum_fraction: f64) -> Self {
        Self {
            attribute: attribute.into(),
            minimum_fraction,
        }
    }

    /// Providers state constraints as absolute head counts against the venue size.
    pub fn from_min_count(
        attribute: impl Into<AttributeId>,
        min_count: u64,
        target_capacity: u64,
    ) -> Result<Self, AdmissionError> {
        let attribute = attribute.into();
        if target_capacity == 0 {
            return Err(invalid_profile(format!(
                "cannot derive fraction for '{attribute}' against zero capacity"
            )));
        }
        Ok(Self {
            attribute,
            minimum_fraction: min_count as f64 / target_capacity as f64,
        })
    }

    pub fn required_count(&self, target_capacity: u64) -> u64 {
        // epsilon absorbs float noise from fractions built via `from_min_count`
        ((self.minimum_fraction * target_capacity as f64) - 1e-9)
            .ceil()
            .max(0.0) as u64
    }
}

/// Static description of one scenario. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeProfile {
    constraints: Vec<Constraint>,
    target_capacity: u64,
    rejection_budget: u64,
    #[serde(default)]
    statistics: Option<AttributeStatistics>,
}

impl AttributeProfile {
    pub fn new(
        constraints: Vec<Constraint>,
        target_capacity: u64,
        rejection_budget: u64,
    ) -> Result<Self, AdmissionError> {
        if target_capacity == 0 {
            return Err(invalid_profile("target_capacity must be positive"));
        }
        if rejection_budget == 0 {
            return Err(invalid_profile("rejection_budget must be positive"));
        }

        let mut seen = BTreeSet::new();
        for constraint in &constraints {
            let fraction = constraint.minimum_fraction;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(invalid_profile(format!(
                    "minimum_fraction for '{}' must be in (0, 1], got {}",
                    constraint.attribute, fraction
                )));
            }
            if !seen.insert(constraint.attribute.as_str()) {
                return Err(invalid_profile(format!(
                    "duplicate constraint for attribute '{}'",
                    constraint.attribute
                )));
            }
        }

        Ok(Self {
            constraints,
            target_capacity,
            rejection_budget,
            statistics: None,
        })
    }

    pub fn with_statistics(mut self, statistics: AttributeStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn target_capacity(&self) -> u64 {
        self.target_capacity
    }

    pub fn rejection_budget(&self) -> u64 {
        self.rejection_budget
    }

    pub fn statistics(&self) -> Option<&AttributeStatistics> {
        self.statistics.as_ref()
    }

    pub fn constraint(&self, attribute: &str) -> Option<&Constraint> {
        self.constraints
            .iter()
            .find(|constraint| constraint.attribute == attribute)
    }

    /// Required fraction over observed frequency; above 1.0 the attribute must be
    /// admitted more often than it shows up at the door.
    pub fn difficulty(&self, constraint: &Constraint) -> Option<f64> {
        let frequency = self.statistics.as_ref()?.frequency(&constraint.attribute)?;
        if frequency <= 0.0 {
            return None;
        }
        Some(constraint.minimum_fraction / frequency)
    }

    pub fn no_attribute_share(&self) -> Option<f64> {
        let statistics = self.statistics.as_ref()?;
        let attributes: Vec<&str> = self
            .constraints
            .iter()
            .map(|constraint| constraint.attribute.as_str())
            .collect();
        statistics.no_attribute_share(&attributes)
    }
}

/// What the provider's statistics say about one constraint before any
/// arrival is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOutlook {
    pub attribute: AttributeId,
    pub required_count: u64,
    /// Holders expected among `target_capacity` arrivals taken blindly.
    pub expected_yield: f64,
    pub difficulty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOutlook {
    pub constraints: Vec<ConstraintOutlook>,
    pub no_attribute_share: Option<f64>,
}

impl AttributeProfile {
    /// `None` without provider statistics.
    pub fn outlook(&self) -> Option<ProfileOutlook> {
        let statistics = self.statistics.as_ref()?;
        let constraints = self
            .constraints
            .iter()
            .map(|constraint| ConstraintOutlook {
                attribute: constraint.attribute.clone(),
                required_count: constraint.required_count(self.target_capacity),
                expected_yield: statistics
                    .expected_yield(&constraint.attribute, self.target_capacity),
                difficulty: self.difficulty(constraint),
            })
            .collect();

        Some(ProfileOutlook {
            constraints,
            no_attribute_share: self.no_attribute_share(),
        })
    }
}
