use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{AdmissionError, invalid_config},
    profile::{Arrival, AttributeStatistics},
    session::{
        error::{BoundaryError, map_http_error, permanent, protocol_violation, transient},
        ports::SessionPort,
        types::{ConstraintSpec, ProviderStatus, SessionAck, SessionStart},
    },
};

fn default_base_url() -> String {
    "https://berghain.challenges.listenlabs.ai".to_string()
}

fn default_scenario() -> u8 {
    1
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_target_capacity() -> u64 {
    1_000
}

fn default_rejection_budget() -> u64 {
    20_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSessionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default = "default_scenario")]
    pub scenario: u8,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_target_capacity")]
    pub target_capacity: u64,
    #[serde(default = "default_rejection_budget")]
    pub rejection_budget: u64,
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            player_id: None,
            scenario: default_scenario(),
            request_timeout_ms: default_request_timeout_ms(),
            target_capacity: default_target_capacity(),
            rejection_budget: default_rejection_budget(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewGameResponse {
    game_id: String,
    #[serde(default)]
    constraints: Vec<WireConstraint>,
    #[serde(default)]
    attribute_statistics: WireStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConstraint {
    attribute: String,
    min_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatistics {
    #[serde(default)]
    relative_frequencies: BTreeMap<String, f64>,
    #[serde(default)]
    correlations: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideResponse {
    status: String,
    #[serde(default)]
    admitted_count: Option<u64>,
    #[serde(default)]
    rejected_count: Option<u64>,
    #[serde(default)]
    next_person: Option<WirePerson>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePerson {
    person_index: u64,
    attributes: BTreeMap<String, bool>,
}

impl From<WirePerson> for Arrival {
    fn from(person: WirePerson) -> Self {
        Arrival::new(person.person_index, person.attributes)
    }
}

/// Remote game server adapter. The server folds "submit verdict" and "next
/// arrival" into one `decide-and-next` call, so the arrival returned with an
/// acknowledgement is held until the following `fetch_next`.
pub struct HttpSession {
    client: Client,
    config: HttpSessionConfig,
    player_id: String,
    game_id: Option<String>,
    primed: bool,
    next: Option<Arrival>,
    pending: Option<Arrival>,
    status: ProviderStatus,
}

impl HttpSession {
    pub fn new(config: HttpSessionConfig) -> Result<Self, AdmissionError> {
        if !(1..=3).contains(&config.scenario) {
            return Err(invalid_config(format!(
                "scenario must be 1, 2, or 3, got {}",
                config.scenario
            )));
        }
        let player_id = config
            .player_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| invalid_config("session.player_id is required"))?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| invalid_config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            config,
            player_id,
            game_id: None,
            primed: false,
            next: None,
            pending: None,
            status: ProviderStatus::Running,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BoundaryError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|err| transient(format!("session request '{path}' failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| protocol_violation(format!("malformed '{path}' payload: {err}")))
    }

    async fn decide_and_next(
        &mut self,
        person_index: u64,
        accept: Option<bool>,
    ) -> Result<SessionAck, BoundaryError> {
        let game_id = self
            .game_id
            .clone()
            .ok_or_else(|| protocol_violation("session has not been started"))?;

        let mut query = vec![
            ("gameId", game_id),
            ("personIndex", person_index.to_string()),
        ];
        if let Some(accept) = accept {
            query.push(("accept", accept.to_string()));
        }

        let response: DecideResponse = self.get_json("decide-and-next", &query).await?;
        let status = ProviderStatus::from_wire(&response.status).ok_or_else(|| {
            protocol_violation(format!("unknown game status '{}'", response.status))
        })?;
        if status == ProviderStatus::Failed {
            tracing::warn!(
                target: "session",
                reason = response.reason.as_deref().unwrap_or("unspecified"),
                "provider_reported_failure"
            );
        }

        self.status = status;
        self.next = response.next_person.map(Arrival::from);
        Ok(SessionAck {
            status,
            admitted_count: response.admitted_count,
            rejected_count: response.rejected_count,
        })
    }
}

#[async_trait]
impl SessionPort for HttpSession {
    #[tracing::instrument(name = "http_session_start", target = "session", skip(self))]
    async fn start(&mut self) -> Result<SessionStart, BoundaryError> {
        let query = [
            ("scenario", self.config.scenario.to_string()),
            ("playerId", self.player_id.clone()),
        ];
        let response: NewGameResponse = self.get_json("new-game", &query).await?;

        self.game_id = Some(response.game_id.clone());
        self.primed = false;
        self.next = None;
        self.pending = None;
        self.status = ProviderStatus::Running;

        tracing::info!(
            target: "session",
            game_id = %response.game_id,
            scenario = self.config.scenario,
            constraints = response.constraints.len(),
            "session_started"
        );

        Ok(SessionStart {
            session_id: response.game_id,
            constraints: response
                .constraints
                .into_iter()
                .map(|constraint| ConstraintSpec {
                    attribute: constraint.attribute,
                    min_count: constraint.min_count,
                })
                .collect(),
            target_capacity: self.config.target_capacity,
            rejection_budget: self.config.rejection_budget,
            statistics: AttributeStatistics {
                relative_frequencies: response.attribute_statistics.relative_frequencies,
                correlations: response.attribute_statistics.correlations,
            },
        })
    }

    async fn fetch_next(&mut self) -> Result<Option<Arrival>, BoundaryError> {
        if self.pending.is_some() {
            return Err(protocol_violation(
                "fetch_next called before the pending verdict was submitted",
            ));
        }
        if !self.primed {
            // first arrival is requested without a verdict
            self.decide_and_next(0, None).await?;
            self.primed = true;
        }
        if self.status != ProviderStatus::Running {
            return Ok(None);
        }

        self.pending = self.next.take();
        Ok(self.pending.clone())
    }

    async fn submit_verdict(&mut self, admitted: bool) -> Result<SessionAck, BoundaryError> {
        let arrival = self.pending.take().ok_or_else(|| {
            protocol_violation("submit_verdict called without a pending arrival")
        })?;

        self.decide_and_next(arrival.person_index, Some(admitted))
            .await
            .map_err(|err| {
                // the server may or may not have applied this verdict
                permanent(format!(
                    "verdict for arrival #{} not acknowledged: {err}",
                    arrival.person_index
                ))
            })
    }
}
