use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::types::AttributeId;

const DEFAULT_FREQUENCY: f64 = 0.5;
const MIN_NO_ATTRIBUTE_SHARE: f64 = 0.05;
const MAX_NO_ATTRIBUTE_SHARE: f64 = 0.8;

/// Marginal frequencies and pairwise correlations observed by the provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeStatistics {
    #[serde(default)]
    pub relative_frequencies: BTreeMap<AttributeId, f64>,
    #[serde(default)]
    pub correlations: BTreeMap<AttributeId, BTreeMap<AttributeId, f64>>,
}

impl AttributeStatistics {
    pub fn is_empty(&self) -> bool {
        self.relative_frequencies.is_empty() && self.correlations.is_empty()
    }

    pub fn frequency(&self, attribute: &str) -> Option<f64> {
        self.relative_frequencies.get(attribute).copied()
    }

    pub fn correlation(&self, left: &str, right: &str) -> Option<f64> {
        self.correlations
            .get(left)
            .and_then(|row| row.get(right))
            .copied()
    }

    /// Expected number of arrivals carrying `attribute` among the next `remaining`.
    pub fn expected_yield(&self, attribute: &str, remaining: u64) -> f64 {
        remaining as f64 * self.frequency(attribute).unwrap_or(DEFAULT_FREQUENCY)
    }

    /// Probability that an arrival carries none of `attributes`.
    pub fn no_attribute_share(&self, attributes: &[&str]) -> Option<f64> {
        if self.relative_frequencies.is_empty() {
            return None;
        }

        let frequency = |attribute: &str| self.frequency(attribute).unwrap_or(DEFAULT_FREQUENCY);
        match attributes {
            [] => Some(1.0),
            [only] => Some(1.0 - frequency(*only)),
            [left, right] => {
                let (p_left, p_right) = (frequency(*left), frequency(*right));
                // correlation is not a joint probability; only positive correlation
                // inflates the independence estimate
                let correlation = self.correlation(*left, *right).unwrap_or(0.0).max(0.0);
                let joint = (p_left * p_right * (1.0 + correlation)).min(p_left.min(p_right));
                let neither = 1.0 - (p_left + p_right - joint);
                Some(neither.clamp(MIN_NO_ATTRIBUTE_SHARE, MAX_NO_ATTRIBUTE_SHARE))
            }
            many => {
                let none = many
                    .iter()
                    .fold(1.0, |acc, attribute| acc * (1.0 - frequency(*attribute)));
                Some(none.clamp(MIN_NO_ATTRIBUTE_SHARE, MAX_NO_ATTRIBUTE_SHARE))
            }
        }
    }
}
