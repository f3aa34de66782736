use crate::brain::{parse_list, parse_optional, BrainState};
use crate::brain::{BrainHealth, Brief, Instance, Project, Session, Teammate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
}

/// Accepts integers, floats, numeric strings and null. Anything else is 0.
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u64).unwrap_or(0))
}

pub(crate) fn lenient_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u64))
}

pub(crate) fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse().ok(),
        _ => None,
    })
}

/// Ids and priorities show up as either strings or numbers.
pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => Some(raw),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

pub(crate) fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|raw| raw.is_finite() && *raw >= 0.0)
                .map(|raw| raw.round() as u64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Stop,
    SkillInvoke,
    Other,
}

/// One hook event as recorded by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub skill_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub duration_s: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub cache_read: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub cache_create: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_used: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_max: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_remaining: u64,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self.event.as_str() {
            "start" => EventKind::Start,
            "stop" => EventKind::Stop,
            "skill_invoke" => EventKind::SkillInvoke,
            _ => EventKind::Other,
        }
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.ts.as_deref().filter(|ts| !ts.trim().is_empty())
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.agent.as_deref().filter(|agent| !agent.is_empty())
    }

    pub fn direct_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn cached_tokens(&self) -> u64 {
        self.cache_read.saturating_add(self.cache_create)
    }

    pub fn total_tokens(&self) -> u64 {
        self.direct_tokens().saturating_add(self.cached_tokens())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentLevel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub tier: u64,
    #[serde(default)]
    pub evolution: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub next_at: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentStats {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub invocations: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_output_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_cache_read_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_cache_create_tokens: u64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub avg_duration_seconds: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub level: Option<AgentLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Totals {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_invocations: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_input_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_output_tokens: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_cache_tokens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub consumed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub ceiling: u64,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub warning_threshold: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub critical_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextWindow {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_used: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_max: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub context_remaining: u64,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillHeatmap {
    #[serde(default)]
    pub skills: BTreeMap<String, u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: u64,
}

/// Full state payload served by `/api/state` and pushed as `state` frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentStats>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub recent_events: Vec<AgentEvent>,
    #[serde(default)]
    pub totals: Totals,
    #[serde(default)]
    pub context_window: Option<ContextWindow>,
    #[serde(default)]
    pub skill_heatmap: Option<SkillHeatmap>,
    #[serde(default)]
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_push: Option<String>,
    #[serde(default)]
    pub last_pull: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub queue_depth: u64,
}

impl SyncStatus {
    pub fn status_label(&self) -> String {
        self.status
            .as_deref()
            .filter(|status| !status.is_empty())
            .unwrap_or("offline")
            .to_uppercase()
    }

    pub fn is_online(&self) -> bool {
        self.status_label() == "ONLINE"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoordinationEntry {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeamStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub is_team_lead: bool,
    #[serde(default)]
    pub teammates: Vec<Teammate>,
    #[serde(default)]
    pub coordination_log: Vec<CoordinationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Learning {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeState {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub learnings_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub errors_count: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub patterns_count: u64,
    #[serde(default)]
    pub recent: Vec<Learning>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillEventPayload {
    #[serde(default)]
    pub skill_name: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

/// One decoded push-channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    State(Box<StateSnapshot>),
    Event(AgentEvent),
    BrainState(BrainState),
    BrainHealth(Option<BrainHealth>),
    BrainInstances(Option<Vec<Instance>>),
    BrainProjects(Option<Vec<Project>>),
    BrainBriefs(Option<Vec<Brief>>),
    BrainSessions(Option<Vec<Session>>),
    SyncStatus(SyncStatus),
    TeamStatus(TeamStatus),
    SkillEvent(SkillEventPayload),
    BrainKnowledge(KnowledgeState),
    Pong,
    Unknown(String),
}

impl ServerMsg {
    pub fn kind(&self) -> &str {
        match self {
            ServerMsg::State(_) => "state",
            ServerMsg::Event(_) => "event",
            ServerMsg::BrainState(_) => "brain_state",
            ServerMsg::BrainHealth(_) => "brain_health",
            ServerMsg::BrainInstances(_) => "brain_instances",
            ServerMsg::BrainProjects(_) => "brain_projects",
            ServerMsg::BrainBriefs(_) => "brain_briefs",
            ServerMsg::BrainSessions(_) => "brain_sessions",
            ServerMsg::SyncStatus(_) => "sync_status",
            ServerMsg::TeamStatus(_) => "team_status",
            ServerMsg::SkillEvent(_) => "skill_event",
            ServerMsg::BrainKnowledge(_) => "brain_knowledge",
            ServerMsg::Pong => "pong",
            ServerMsg::Unknown(kind) => kind.as_str(),
        }
    }
}

/// Decodes a `{"type": .., "data": ..}` frame. When `data` is absent the
/// frame itself is used as the payload.
pub fn decode_server_msg(text: &str) -> Result<ServerMsg, WireError> {
    let mut frame: Value = serde_json::from_str(text)?;
    let kind = frame
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(WireError::MissingType)?;
    let data = frame.as_object_mut().and_then(|map| map.remove("data"));
    let data = data.unwrap_or(frame);

    let msg = match kind.as_str() {
        "state" => ServerMsg::State(Box::new(serde_json::from_value(data)?)),
        "event" => ServerMsg::Event(serde_json::from_value(data)?),
        "brain_state" => ServerMsg::BrainState(BrainState::from_value(&data)),
        "brain_health" => ServerMsg::BrainHealth(parse_optional(&data)),
        "brain_instances" => ServerMsg::BrainInstances(parse_list(&data, "instances")),
        "brain_projects" => ServerMsg::BrainProjects(parse_list(&data, "projects")),
        "brain_briefs" => ServerMsg::BrainBriefs(parse_list(&data, "briefs")),
        "brain_sessions" => ServerMsg::BrainSessions(parse_list(&data, "sessions")),
        "sync_status" => ServerMsg::SyncStatus(serde_json::from_value(data)?),
        "team_status" => ServerMsg::TeamStatus(serde_json::from_value(data)?),
        "skill_event" => ServerMsg::SkillEvent(serde_json::from_value(data)?),
        "brain_knowledge" => ServerMsg::BrainKnowledge(serde_json::from_value(data)?),
        "pong" => ServerMsg::Pong,
        _ => ServerMsg::Unknown(kind),
    };
    Ok(msg)
}

pub fn encode_ping() -> String {
    serde_json::json!({ "type": "ping" }).to_string()
}
