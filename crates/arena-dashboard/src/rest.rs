use arena_core::brain::{parse_list, parse_optional};
use arena_core::pricing::{PricingResponse, PricingTable};
use arena_core::wire::{KnowledgeState, SyncStatus, TeamStatus};
use arena_core::{BrainState, StateSnapshot, TimeRange};
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BRAIN_ENDPOINTS: [&str; 5] = ["health", "instances", "projects", "briefs", "sessions"];

#[derive(Debug, Error)]
pub enum RestError {
    #[error("bad endpoint {0}: {1}")]
    Url(String, url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Results of REST calls, delivered to the UI loop.
#[derive(Debug)]
pub enum RestUpdate {
    State {
        range: TimeRange,
        snapshot: Box<StateSnapshot>,
    },
    Pricing(Option<PricingTable>),
    SyncStatus(SyncStatus),
    TeamStatus(TeamStatus),
    Knowledge(KnowledgeState),
    Brain(BrainState),
    Failed {
        what: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    pub fn new(base: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, RestError> {
        self.base
            .join(path)
            .map_err(|err| RestError::Url(path.to_string(), err))
    }

    async fn get_value(&self, path: String) -> Result<Value, RestError> {
        let url = self.endpoint(&path)?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let value = self.get_value(path.to_string()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn fetch_state(&self, range: TimeRange) -> Result<StateSnapshot, RestError> {
        self.get_json(&format!("api/state?range={}", range.as_str()))
            .await
    }

    pub async fn fetch_pricing(&self) -> Result<Option<PricingTable>, RestError> {
        let response: PricingResponse = self.get_json("api/pricing").await?;
        Ok(response.pricing)
    }

    pub async fn fetch_sync_status(&self) -> Result<SyncStatus, RestError> {
        self.get_json("api/sync-status").await
    }

    pub async fn fetch_team_status(&self) -> Result<TeamStatus, RestError> {
        self.get_json("api/team-status").await
    }

    pub async fn fetch_knowledge(&self) -> Result<KnowledgeState, RestError> {
        self.get_json("api/brain/knowledge").await
    }

    /// Hits every brain endpoint at once; each one succeeds or fails on its
    /// own. A list endpoint that answers with an unexpected shape counts as
    /// reachable but empty.
    pub async fn poll_brain(&self) -> BrainState {
        let started = Instant::now();
        let results = join_all(
            BRAIN_ENDPOINTS
                .iter()
                .map(|name| self.get_value(format!("api/brain/{name}"))),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut values = results.into_iter().zip(BRAIN_ENDPOINTS).map(|(result, name)| {
            result
                .map_err(|err| debug!("brain_{name}_error: {err}"))
                .ok()
        });
        let mut next = || values.next().flatten();
        let health = next();
        let instances = next();
        let projects = next();
        let briefs = next();
        let sessions = next();

        BrainState {
            health: health.as_ref().and_then(parse_optional),
            instances: instances.map(|v| parse_list(&v, "instances").unwrap_or_default()),
            projects: projects.map(|v| parse_list(&v, "projects").unwrap_or_default()),
            briefs: briefs.map(|v| parse_list(&v, "briefs").unwrap_or_default()),
            sessions: sessions.map(|v| parse_list(&v, "sessions").unwrap_or_default()),
            latency_ms: Some(latency_ms),
        }
    }
}

pub fn spawn_state_fetch(client: RestClient, range: TimeRange, tx: mpsc::Sender<RestUpdate>) {
    tokio::spawn(async move {
        let update = match client.fetch_state(range).await {
            Ok(snapshot) => RestUpdate::State {
                range,
                snapshot: Box::new(snapshot),
            },
            Err(err) => {
                warn!("state_fetch_error: {err}");
                RestUpdate::Failed {
                    what: "state",
                    message: err.to_string(),
                }
            }
        };
        let _ = tx.send(update).await;
    });
}

/// Pricing, sync, team and knowledge panels in one concurrent round.
pub fn spawn_panel_fetch(client: RestClient, tx: mpsc::Sender<RestUpdate>) {
    tokio::spawn(async move {
        let (pricing, sync, team, knowledge) = tokio::join!(
            client.fetch_pricing(),
            client.fetch_sync_status(),
            client.fetch_team_status(),
            client.fetch_knowledge(),
        );
        let mut updates = Vec::new();
        match pricing {
            Ok(table) => updates.push(RestUpdate::Pricing(table)),
            Err(err) => warn!("pricing_fetch_error: {err}"),
        }
        match sync {
            Ok(status) => updates.push(RestUpdate::SyncStatus(status)),
            Err(err) => debug!("sync_status_fetch_error: {err}"),
        }
        match team {
            Ok(status) => updates.push(RestUpdate::TeamStatus(status)),
            Err(err) => debug!("team_status_fetch_error: {err}"),
        }
        match knowledge {
            Ok(state) => updates.push(RestUpdate::Knowledge(state)),
            Err(err) => debug!("knowledge_fetch_error: {err}"),
        }
        for update in updates {
            if tx.send(update).await.is_err() {
                return;
            }
        }
    });
}

pub fn spawn_brain_poll(client: RestClient, tx: mpsc::Sender<RestUpdate>) {
    tokio::spawn(async move {
        let brain = client.poll_brain().await;
        let _ = tx.send(RestUpdate::Brain(brain)).await;
    });
}

pub async fn brain_poll_loop(client: RestClient, every: Duration, tx: mpsc::Sender<RestUpdate>) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let brain = client.poll_brain().await;
        if !brain.has_data() {
            debug!("brain_poll_empty");
        }
        if tx.send(RestUpdate::Brain(brain)).await.is_err() {
            return;
        }
    }
}
