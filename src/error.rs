use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionErrorKind {
    InvalidProfile,
    MalformedArrival,
    Boundary,
    InvalidConfig,
    InvariantViolation,
    Persistence,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AdmissionError {
    pub kind: AdmissionErrorKind,
    pub message: String,
}

impl AdmissionError {
    pub fn new(kind: AdmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub fn invalid_profile(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::InvalidProfile, message)
}

pub fn malformed_arrival(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::MalformedArrival, message)
}

pub fn invalid_config(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::InvalidConfig, message)
}

pub fn invariant_violation(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::InvariantViolation, message)
}

pub fn persistence_error(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::Persistence, message)
}

pub fn cancelled(message: impl Into<String>) -> AdmissionError {
    AdmissionError::new(AdmissionErrorKind::Cancelled, message)
}

impl From<crate::session::BoundaryError> for AdmissionError {
    fn from(err: crate::session::BoundaryError) -> Self {
        AdmissionError::new(AdmissionErrorKind::Boundary, err.to_string())
    }
}
