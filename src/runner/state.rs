use serde::{Deserialize, Serialize};

use crate::ledger::RunStatus;

/// Lifecycle of one run. Every variant except `Running` is terminal and
/// absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Running,
    CompletedFull,
    AbortedRejectionLimit,
    AbortedError { reason: String },
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::CompletedFull => "completed_full",
            RunState::AbortedRejectionLimit => "aborted_rejection_limit",
            RunState::AbortedError { .. } => "aborted_error",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        RunState::AbortedError {
            reason: reason.into(),
        }
    }
}

impl From<RunStatus> for RunState {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Running => RunState::Running,
            RunStatus::CompletedFull => RunState::CompletedFull,
            RunStatus::AbortedRejectionLimit => RunState::AbortedRejectionLimit,
        }
    }
}
