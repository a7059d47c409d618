use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AdmissionError, invariant_violation},
    ledger::{ConstraintLedger, LedgerSnapshot, RunStatus},
    policy::{DecisionContext, DecisionPolicy, Policy, PolicyConfig},
    profile::{Arrival, AttributeProfile},
    results::RunSummary,
    runner::{
        progress::{DecisionRecord, ProgressSnapshot},
        state::RunState,
    },
    session::{BoundaryError, FetchRetry, ProviderStatus, SessionAck, SessionPort},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunLoopConfig {
    pub record_history: bool,
    pub fetch_retry: FetchRetry,
}

impl RunLoopConfig {
    pub fn new(record_history: bool, fetch_retry_backoff: Duration) -> Self {
        Self {
            record_history,
            fetch_retry: FetchRetry::new(fetch_retry_backoff),
        }
    }
}

/// Drives one admission run: fetch an arrival, ask the policy, submit the
/// verdict, record it, check for termination. Owns its ledger and policy so
/// runs never share mutable state.
pub struct RunLoop<S: SessionPort> {
    profile: AttributeProfile,
    policy: Policy,
    session: S,
    session_id: Option<String>,
    ledger: ConstraintLedger,
    config: RunLoopConfig,
    state: RunState,
    step: u64,
    history: Vec<DecisionRecord>,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

impl<S: SessionPort> RunLoop<S> {
    pub fn new(profile: AttributeProfile, policy: Policy, session: S, config: RunLoopConfig) -> Self {
        let ledger = ConstraintLedger::new(&profile);
        let state = RunState::from(ledger.status(&profile));
        let (progress_tx, _) = watch::channel(ProgressSnapshot::capture(
            0,
            &ledger.snapshot(),
            &profile,
            state.clone(),
        ));

        Self {
            profile,
            policy,
            session,
            session_id: None,
            ledger,
            config,
            state,
            step: 0,
            history: Vec::new(),
            progress_tx,
        }
    }

    /// Opens the provider session and builds the run from what it reports.
    #[tracing::instrument(name = "run_loop_start", target = "runner", skip(session, policy_config, config))]
    pub async fn start(
        mut session: S,
        policy_config: &PolicyConfig,
        run_index: u64,
        config: RunLoopConfig,
    ) -> Result<Self, AdmissionError> {
        let start = session.start().await?;
        let profile = start.to_profile()?;
        let policy = policy_config.build(run_index)?;

        tracing::info!(
            target: "runner",
            session_id = %start.session_id,
            policy = %policy.label(),
            constraints = profile.constraints().len(),
            target_capacity = profile.target_capacity(),
            rejection_budget = profile.rejection_budget(),
            no_attribute_share = ?profile.no_attribute_share(),
            "run_started"
        );
        if let Some(outlook) = profile.outlook() {
            for constraint in &outlook.constraints {
                tracing::info!(
                    target: "runner",
                    attribute = %constraint.attribute,
                    required_count = constraint.required_count,
                    expected_yield = constraint.expected_yield,
                    difficulty = ?constraint.difficulty,
                    "constraint_outlook"
                );
            }
        }

        let mut run = Self::new(profile, policy, session, config);
        run.session_id = Some(start.session_id);
        Ok(run)
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn profile(&self) -> &AttributeProfile {
        &self.profile
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn ledger(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn history(&self) -> &[DecisionRecord] {
        &self.history
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress_tx.borrow().clone()
    }

    /// Observers never block the loop; a slow receiver just sees the latest
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Runs until a terminal state. Cancellation is only observed between
    /// steps, so a verdict is never left half-recorded.
    #[tracing::instrument(
        name = "run_loop",
        target = "runner",
        skip(self, cancel),
        fields(policy = %self.policy.label(), session_id = ?self.session_id)
    )]
    pub async fn run(&mut self, cancel: CancellationToken) -> RunState {
        while !self.state.is_terminal() {
            if cancel.is_cancelled() {
                self.finish(RunState::Cancelled);
                break;
            }
            self.step().await;
        }
        self.state.clone()
    }

    pub async fn run_steps(&mut self, steps: u64) -> RunState {
        for _ in 0..steps {
            if self.state.is_terminal() {
                break;
            }
            self.step().await;
        }
        self.state.clone()
    }

    /// One fetch, decide, submit, record cycle. A terminal run is left as is.
    pub async fn step(&mut self) -> RunState {
        if self.state.is_terminal() {
            return self.state.clone();
        }

        let arrival = match self.fetch_with_retry().await {
            Ok(Some(arrival)) => arrival,
            Ok(None) => {
                let status = self.ledger.status(&self.profile);
                if status.is_terminal() {
                    self.finish(RunState::from(status));
                } else {
                    self.abort("arrival stream exhausted");
                }
                return self.state.clone();
            }
            Err(err) => {
                self.abort(format!("fetch failed: {err}"));
                return self.state.clone();
            }
        };

        let before = self.ledger.snapshot();
        let verdict = {
            let ctx = DecisionContext::new(&arrival, &before, &self.profile);
            self.policy.decide(&ctx)
        };
        let admitted = match verdict {
            Ok(admitted) => admitted,
            Err(err) => {
                self.abort(format!("decision failed: {err}"));
                return self.state.clone();
            }
        };

        let ack = match self.session.submit_verdict(admitted).await {
            Ok(ack) => ack,
            Err(err) => {
                self.abort(format!(
                    "submit failed for arrival #{}: {err}",
                    arrival.person_index
                ));
                return self.state.clone();
            }
        };

        if let Err(err) = self.apply(&arrival, admitted, &before, &ack) {
            self.abort(err.message);
            return self.state.clone();
        }

        self.publish();
        self.state.clone()
    }

    pub fn into_summary(self) -> RunSummary {
        let history = self.config.record_history.then_some(self.history);
        RunSummary::build(
            self.policy.label(),
            self.session_id,
            &self.profile,
            &self.ledger.snapshot(),
            self.state,
            self.step,
            history,
        )
    }

    async fn fetch_with_retry(&mut self) -> Result<Option<Arrival>, BoundaryError> {
        let mut attempt = 0;
        loop {
            match self.session.fetch_next().await {
                Ok(next) => return Ok(next),
                Err(err) if self.config.fetch_retry.can_retry(&err, attempt) => {
                    tracing::warn!(
                        target: "runner",
                        step = self.step,
                        attempt = attempt + 1,
                        error = %err,
                        "fetch_retrying"
                    );
                    attempt += 1;
                    let backoff = self.config.fetch_retry.backoff();
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn apply(
        &mut self,
        arrival: &Arrival,
        admitted: bool,
        before: &LedgerSnapshot,
        ack: &SessionAck,
    ) -> Result<(), AdmissionError> {
        let expected_admitted = before.admitted_total + u64::from(admitted);
        let expected_rejected = before.rejected_total + u64::from(!admitted);
        if let Some(reported) = ack.admitted_count
            && reported != expected_admitted
        {
            return Err(invariant_violation(format!(
                "provider reports {reported} admitted, ledger expects {expected_admitted}"
            )));
        }
        if let Some(reported) = ack.rejected_count
            && reported != expected_rejected
        {
            return Err(invariant_violation(format!(
                "provider reports {reported} rejected, ledger expects {expected_rejected}"
            )));
        }

        let after = self.ledger.record(&arrival.attributes, admitted)?.clone();
        self.step += 1;

        tracing::debug!(
            target: "runner",
            step = self.step,
            person_index = arrival.person_index,
            admitted = admitted,
            admitted_total = after.admitted_total,
            rejected_total = after.rejected_total,
            "verdict_recorded"
        );

        if self.config.record_history {
            self.history.push(DecisionRecord {
                step: self.step,
                person_index: arrival.person_index,
                attributes: arrival.attributes.clone(),
                admitted,
                admitted_before: before.admitted_total,
                rejected_before: before.rejected_total,
                admitted_after: after.admitted_total,
                rejected_after: after.rejected_total,
            });
        }

        let status = after.status(&self.profile);
        match (status, ack.status) {
            (RunStatus::Running, ProviderStatus::Running) => Ok(()),
            (RunStatus::CompletedFull, ProviderStatus::Completed)
            | (RunStatus::AbortedRejectionLimit, ProviderStatus::Failed) => {
                self.finish(RunState::from(status));
                Ok(())
            }
            (ledger_status, ProviderStatus::Running) => {
                tracing::warn!(
                    target: "runner",
                    step = self.step,
                    ledger_status = ?ledger_status,
                    "provider_still_running_after_ledger_terminal"
                );
                self.finish(RunState::from(ledger_status));
                Ok(())
            }
            (ledger_status, provider_status) => Err(invariant_violation(format!(
                "provider reports {provider_status:?} while ledger status is {ledger_status:?}"
            ))),
        }
    }

    fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(
            target: "runner",
            step = self.step,
            reason = %reason,
            "run_aborted"
        );
        self.finish(RunState::aborted(reason));
    }

    fn finish(&mut self, state: RunState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        let snapshot = self.ledger.snapshot();
        tracing::info!(
            target: "runner",
            step = self.step,
            state = self.state.label(),
            admitted_total = snapshot.admitted_total,
            rejected_total = snapshot.rejected_total,
            "run_finished"
        );
        self.publish();
    }

    fn publish(&self) {
        let snapshot = ProgressSnapshot::capture(
            self.step,
            &self.ledger.snapshot(),
            &self.profile,
            self.state.clone(),
        );
        self.progress_tx.send_replace(snapshot);
    }
}
