use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryErrorKind {
    Transient,
    Permanent,
    ProtocolViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryError {
    pub kind: BoundaryErrorKind,
    pub message: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
}

impl BoundaryError {
    pub fn new(kind: BoundaryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: matches!(kind, BoundaryErrorKind::Transient),
            http_status: None,
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (http_status={})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BoundaryError {}

pub fn transient(message: impl Into<String>) -> BoundaryError {
    BoundaryError::new(BoundaryErrorKind::Transient, message)
}

pub fn permanent(message: impl Into<String>) -> BoundaryError {
    BoundaryError::new(BoundaryErrorKind::Permanent, message)
}

pub fn protocol_violation(message: impl Into<String>) -> BoundaryError {
    BoundaryError::new(BoundaryErrorKind::ProtocolViolation, message)
}

pub fn map_http_error(status: u16, body: &str) -> BoundaryError {
    let normalized_body = body.chars().take(240).collect::<String>();

    let mut err = if status == 408 || status == 429 || status >= 500 {
        transient(format!("session provider returned status {status}"))
    } else {
        permanent(format!("session provider returned status {status}"))
    }
    .with_http_status(status);

    if !normalized_body.is_empty() {
        err.message = format!("{}: {}", err.message, normalized_body);
    }

    err
}
