use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;

use crate::{
    profile::Arrival,
    session::{
        error::{BoundaryError, BoundaryErrorKind, protocol_violation},
        ports::SessionPort,
        types::{ProviderStatus, SessionAck, SessionStart},
    },
};

/// Failure injected on a given call number (1-based) of `fetch_next` or
/// `submit_verdict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedFailure {
    pub on_call: usize,
    pub kind: BoundaryErrorKind,
}

/// In-memory provider replaying a fixed arrival list. Keeps its own admit and
/// reject counts the way a remote game server would.
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    start: SessionStart,
    arrivals: VecDeque<Arrival>,
    pending: Option<Arrival>,
    admitted: u64,
    rejected: u64,
    verdicts: Vec<(u64, bool)>,
    fetch_calls: usize,
    submit_calls: usize,
    fetch_failures: BTreeMap<usize, BoundaryErrorKind>,
    submit_failures: BTreeMap<usize, BoundaryErrorKind>,
    report_counts: bool,
}

impl ScriptedSession {
    pub fn new(start: SessionStart, arrivals: Vec<Arrival>) -> Self {
        Self {
            start,
            arrivals: arrivals.into(),
            pending: None,
            admitted: 0,
            rejected: 0,
            verdicts: Vec::new(),
            fetch_calls: 0,
            submit_calls: 0,
            fetch_failures: BTreeMap::new(),
            submit_failures: BTreeMap::new(),
            report_counts: true,
        }
    }

    pub fn with_fetch_failure(mut self, failure: ScriptedFailure) -> Self {
        self.fetch_failures.insert(failure.on_call, failure.kind);
        self
    }

    pub fn with_submit_failure(mut self, failure: ScriptedFailure) -> Self {
        self.submit_failures.insert(failure.on_call, failure.kind);
        self
    }

    /// Acks carry only the status, like providers that do not echo counts.
    pub fn without_counts(mut self) -> Self {
        self.report_counts = false;
        self
    }

    pub fn verdicts(&self) -> &[(u64, bool)] {
        &self.verdicts
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls
    }

    pub fn remaining_arrivals(&self) -> usize {
        self.arrivals.len()
    }

    fn status(&self) -> ProviderStatus {
        if self.admitted >= self.start.target_capacity {
            ProviderStatus::Completed
        } else if self.rejected >= self.start.rejection_budget {
            ProviderStatus::Failed
        } else {
            ProviderStatus::Running
        }
    }

    fn injected(failures: &BTreeMap<usize, BoundaryErrorKind>, call: usize) -> Option<BoundaryError> {
        failures.get(&call).map(|kind| {
            BoundaryError::new(*kind, format!("scripted {kind:?} failure on call {call}"))
        })
    }
}

#[async_trait]
impl SessionPort for ScriptedSession {
    async fn start(&mut self) -> Result<SessionStart, BoundaryError> {
        Ok(self.start.clone())
    }

    async fn fetch_next(&mut self) -> Result<Option<Arrival>, BoundaryError> {
        self.fetch_calls += 1;
        if self.pending.is_some() {
            return Err(protocol_violation(
                "fetch_next called before the pending verdict was submitted",
            ));
        }
        if let Some(err) = Self::injected(&self.fetch_failures, self.fetch_calls) {
            return Err(err);
        }
        if self.status() != ProviderStatus::Running {
            return Ok(None);
        }

        let next = self.arrivals.pop_front();
        self.pending = next.clone();
        Ok(next)
    }

    async fn submit_verdict(&mut self, admitted: bool) -> Result<SessionAck, BoundaryError> {
        self.submit_calls += 1;
        let Some(arrival) = self.pending.take() else {
            return Err(protocol_violation(
                "submit_verdict called without a pending arrival",
            ));
        };
        if let Some(err) = Self::injected(&self.submit_failures, self.submit_calls) {
            // verdict never reached the provider; the arrival is gone either way
            return Err(err);
        }

        if admitted {
            self.admitted += 1;
        } else {
            self.rejected += 1;
        }
        self.verdicts.push((arrival.person_index, admitted));

        Ok(SessionAck {
            status: self.status(),
            admitted_count: self.report_counts.then_some(self.admitted),
            rejected_count: self.report_counts.then_some(self.rejected),
        })
    }
}
