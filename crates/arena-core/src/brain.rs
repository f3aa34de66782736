//! Fleet-wide data served by the brain service and the panel views built
//! from it.

use crate::format::{date_group, format_bytes, format_number, format_uptime, parse_timestamp};
use crate::format::relative_time;
use crate::wire::{lenient_opt_string, lenient_opt_u64, value_as_u64};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const PIPELINE_PHASES: [&str; 5] = ["plan", "build", "test", "review", "done"];
pub const BRIEF_PILL_ORDER: [&str; 5] = ["Ready", "In Progress", "Done", "Draft", "Blocked"];
const HEARTBEAT_ACTIVE_SECS: i64 = 60;
const MAX_PROJECT_TAGS: usize = 5;
static NULL: Value = Value::Null;

fn pick<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BrainHealth {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub brain_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub db_size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub db_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub uptime_seconds: Option<u64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub uptime: Option<String>,
    #[serde(default)]
    pub counts: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub total_records: Option<u64>,
}

impl BrainHealth {
    pub fn record_total(&self) -> u64 {
        match &self.counts {
            Some(counts) => counts.values().filter_map(value_as_u64).sum(),
            None => self.total_records.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Teammate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub elapsed: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub instance_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_heartbeat_at: Option<String>,
    #[serde(default)]
    pub last_heartbeat: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub machine_hostname: Option<String>,
    #[serde(default)]
    pub machine_name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub project_slug: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub current_brief: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub is_team_lead: bool,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub teammates: Vec<Teammate>,
}

impl Instance {
    pub fn status_str(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    pub fn heartbeat(&self) -> Option<&str> {
        pick([
            self.last_heartbeat_at.as_deref(),
            self.last_heartbeat.as_deref(),
            self.updated_at.as_deref(),
        ])
    }

    pub fn key(&self, idx: usize) -> String {
        pick([self.instance_id.as_deref(), self.id.as_deref()])
            .map(str::to_string)
            .unwrap_or_else(|| format!("inst-{idx}"))
    }

    pub fn is_team_lead(&self) -> bool {
        self.is_team_lead || !self.teammates.is_empty()
    }

    /// Active when reported so, or when no status is reported and the last
    /// heartbeat is under a minute old.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.status.as_deref() {
            Some("active") => true,
            Some(status) if !status.is_empty() => false,
            _ => self
                .heartbeat()
                .and_then(parse_timestamp)
                .map(|at| now.signed_duration_since(at).num_seconds() < HEARTBEAT_ACTIVE_SECS)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TechList {
    List(Vec<String>),
    Csv(String),
}

impl TechList {
    pub fn tags(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TechList::List(items) => items.iter().map(String::as_str).collect(),
            TechList::Csv(csv) => csv.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<TechList>,
    #[serde(default)]
    pub technologies: Option<TechList>,
    #[serde(default)]
    pub last_session: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Brief {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub project_slug: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub brief_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub priority: Option<String>,
}

impl Brief {
    pub fn project_label(&self) -> &str {
        pick([self.project.as_deref(), self.project_slug.as_deref()]).unwrap_or("--")
    }

    pub fn id_label(&self) -> &str {
        pick([self.brief_id.as_deref(), self.id.as_deref()]).unwrap_or("--")
    }

    pub fn status_label(&self) -> &str {
        pick([self.status.as_deref()]).unwrap_or("--")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub project_slug: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub brief_id: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Session {
    pub fn started(&self) -> &str {
        pick([
            self.started_at.as_deref(),
            self.created_at.as_deref(),
            self.timestamp.as_deref(),
        ])
        .unwrap_or("")
    }
}

/// Accepts either a bare array or an object wrapping the array under `key`.
/// Elements that fail to decode are skipped.
pub fn parse_list<T: DeserializeOwned>(value: &Value, key: &str) -> Option<Vec<T>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get(key)?.as_array()?,
        _ => return None,
    };
    Some(
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
    )
}

pub fn parse_optional<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Last known brain payloads. Each slot is `None` when its endpoint failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrainState {
    pub health: Option<BrainHealth>,
    pub instances: Option<Vec<Instance>>,
    pub projects: Option<Vec<Project>>,
    pub briefs: Option<Vec<Brief>>,
    pub sessions: Option<Vec<Session>>,
    pub latency_ms: Option<u64>,
}

impl BrainState {
    pub fn from_value(value: &Value) -> Self {
        let slot = |key: &str| value.get(key).unwrap_or(&NULL);
        Self {
            health: parse_optional(slot("health")),
            instances: parse_list(slot("instances"), "instances"),
            projects: parse_list(slot("projects"), "projects"),
            briefs: parse_list(slot("briefs"), "briefs"),
            sessions: parse_list(slot("sessions"), "sessions"),
            latency_ms: value
                .get("latency_ms")
                .or_else(|| value.get("_latencyMs"))
                .and_then(value_as_u64),
        }
    }

    pub fn has_data(&self) -> bool {
        self.health.is_some()
            || self.instances.is_some()
            || self.projects.is_some()
            || self.briefs.is_some()
            || self.sessions.is_some()
    }

    pub fn instances(&self) -> &[Instance] {
        self.instances.as_deref().unwrap_or(&[])
    }

    pub fn projects(&self) -> &[Project] {
        self.projects.as_deref().unwrap_or(&[])
    }

    pub fn briefs(&self) -> &[Brief] {
        self.briefs.as_deref().unwrap_or(&[])
    }

    pub fn sessions(&self) -> &[Session] {
        self.sessions.as_deref().unwrap_or(&[])
    }
}

/// Maps free-form phase names onto the pipeline stages.
pub fn normalize_phase(raw: &str) -> Option<&'static str> {
    match raw.trim().to_uppercase().as_str() {
        "PLANNING" | "PLAN" => Some("plan"),
        "BUILDING" | "BUILD" | "IMPLEMENTING" => Some("build"),
        "TESTING" | "TEST" => Some("test"),
        "REVIEWING" | "REVIEW" => Some("review"),
        "COMMITTING" | "COMPLETE" | "DONE" => Some("done"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    Done,
    Active,
    Pending,
}

pub fn pipeline_steps(phase: Option<&str>) -> Vec<(&'static str, PhaseStep)> {
    let current = phase
        .and_then(normalize_phase)
        .and_then(|key| PIPELINE_PHASES.iter().position(|stage| *stage == key));
    PIPELINE_PHASES
        .iter()
        .enumerate()
        .map(|(idx, stage)| {
            let step = match current {
                Some(cur) if idx < cur => PhaseStep::Done,
                Some(cur) if idx == cur => PhaseStep::Active,
                _ => PhaseStep::Pending,
            };
            (*stage, step)
        })
        .collect()
}

/// Instances reporting `active` or `idle`.
pub fn live_instance_count(instances: &[Instance]) -> usize {
    instances
        .iter()
        .filter(|inst| matches!(inst.status_str(), "active" | "idle"))
        .count()
}

pub fn instance_status_counts(instances: &[Instance]) -> (usize, usize) {
    instances
        .iter()
        .fold((0, 0), |(active, idle), inst| match inst.status_str() {
            "active" => (active + 1, idle),
            "idle" => (active, idle + 1),
            _ => (active, idle),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeammateCard {
    pub name: String,
    pub brief: String,
    pub phase: String,
    pub elapsed: String,
    pub steps: Vec<(&'static str, PhaseStep)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceCard {
    pub id: String,
    pub active: bool,
    pub hostname: String,
    pub project: String,
    pub brief: String,
    pub phase: String,
    pub team_lead: bool,
    pub team_name: String,
    pub elapsed: String,
    pub steps: Vec<(&'static str, PhaseStep)>,
    pub teammates: Vec<TeammateCard>,
}

pub fn instance_card(inst: &Instance, idx: usize, now: DateTime<Utc>) -> InstanceCard {
    let phase = pick([inst.phase.as_deref(), inst.current_phase.as_deref()]);
    let teammates = inst
        .teammates
        .iter()
        .enumerate()
        .map(|(pos, mate)| TeammateCard {
            name: pick([mate.name.as_deref()])
                .map(str::to_string)
                .unwrap_or_else(|| format!("Teammate {}", pos + 1)),
            brief: pick([mate.brief.as_deref()]).unwrap_or("--").to_string(),
            phase: pick([mate.phase.as_deref()])
                .unwrap_or("--")
                .to_uppercase(),
            elapsed: pick([mate.elapsed.as_deref()]).unwrap_or("--").to_string(),
            steps: pipeline_steps(mate.phase.as_deref()),
        })
        .collect();

    InstanceCard {
        id: inst.key(idx),
        active: inst.is_active(now),
        hostname: pick([inst.machine_hostname.as_deref(), inst.machine_name.as_deref()])
            .unwrap_or("--")
            .to_string(),
        project: pick([inst.project.as_deref(), inst.project_slug.as_deref()])
            .unwrap_or("--")
            .to_string(),
        brief: pick([inst.brief.as_deref(), inst.current_brief.as_deref()])
            .unwrap_or("--")
            .to_string(),
        phase: phase.unwrap_or("--").to_uppercase(),
        team_lead: inst.is_team_lead(),
        team_name: pick([inst.team_name.as_deref()])
            .unwrap_or("parallel-hunt")
            .to_string(),
        elapsed: inst
            .heartbeat()
            .map(|hb| relative_time(Some(hb), now))
            .unwrap_or_else(|| "--".to_string()),
        steps: pipeline_steps(phase),
        teammates,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCard {
    pub name: String,
    pub slug: Option<String>,
    pub active: bool,
    pub tags: Vec<String>,
    pub updated: Option<String>,
}

pub fn project_card(project: &Project, now: DateTime<Utc>) -> ProjectCard {
    let name = pick([project.name.as_deref(), project.slug.as_deref()]).unwrap_or("--");
    let tags = project
        .tech_stack
        .as_ref()
        .or(project.technologies.as_ref())
        .map(|techs| techs.tags().into_iter().take(MAX_PROJECT_TAGS).collect())
        .unwrap_or_default();
    ProjectCard {
        name: name.to_string(),
        slug: pick([project.slug.as_deref()])
            .filter(|slug| project.name.as_deref() != Some(*slug))
            .map(str::to_string),
        active: project.status.as_deref() == Some("active"),
        tags,
        updated: pick([project.last_session.as_deref(), project.updated_at.as_deref()])
            .map(|ts| relative_time(Some(ts), now)),
    }
}

/// Counts per brief status, known statuses first in pill order.
pub fn brief_status_pills(briefs: &[Brief]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for brief in briefs {
        let status = pick([brief.status.as_deref()]).unwrap_or("Unknown");
        match counts.iter_mut().find(|(name, _)| name == status) {
            Some((_, count)) => *count += 1,
            None => counts.push((status.to_string(), 1)),
        }
    }
    let mut pills: Vec<(String, usize)> = BRIEF_PILL_ORDER
        .iter()
        .filter_map(|known| counts.iter().find(|(name, _)| name == known).cloned())
        .collect();
    pills.extend(
        counts
            .into_iter()
            .filter(|(name, _)| !BRIEF_PILL_ORDER.contains(&name.as_str())),
    );
    pills
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub when: String,
    pub project: String,
    pub brief: Option<String>,
    pub mode: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionGroup {
    pub label: &'static str,
    pub entries: Vec<SessionEntry>,
}

/// Newest first, grouped by day in order of first appearance.
pub fn session_groups(sessions: &[Session], now: DateTime<Utc>) -> Vec<SessionGroup> {
    let mut sorted: Vec<&Session> = sessions.iter().collect();
    sorted.sort_by(|a, b| b.started().cmp(a.started()));

    let mut groups: Vec<SessionGroup> = Vec::new();
    for session in sorted {
        let started = Some(session.started()).filter(|ts| !ts.is_empty());
        let label = date_group(started, now);
        let entry = SessionEntry {
            when: relative_time(started, now),
            project: pick([session.project.as_deref(), session.project_slug.as_deref()])
                .unwrap_or("--")
                .to_string(),
            brief: pick([session.brief.as_deref(), session.brief_id.as_deref()]).map(str::to_string),
            mode: pick([session.mode.as_deref()]).map(str::to_string),
            summary: pick([session.summary.as_deref(), session.goal.as_deref()]).map(str::to_string),
        };
        match groups.iter_mut().find(|group| group.label == label) {
            Some(group) => group.entries.push(entry),
            None => groups.push(SessionGroup {
                label,
                entries: vec![entry],
            }),
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthView {
    pub online: bool,
    pub version: String,
    pub latency: String,
    pub db_size: String,
    pub uptime: String,
    pub records: String,
}

pub fn health_view(health: Option<&BrainHealth>, latency_ms: Option<u64>) -> HealthView {
    let Some(health) = health else {
        return HealthView {
            online: false,
            version: "--".to_string(),
            latency: "N/A".to_string(),
            db_size: "--".to_string(),
            uptime: "--".to_string(),
            records: "0".to_string(),
        };
    };
    HealthView {
        online: true,
        version: pick([health.version.as_deref(), health.brain_version.as_deref()])
            .unwrap_or("--")
            .to_string(),
        latency: latency_ms
            .filter(|ms| *ms > 0)
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "N/A".to_string()),
        db_size: match health.db_size_bytes.filter(|bytes| *bytes > 0) {
            Some(bytes) => format_bytes(bytes),
            None => pick([health.db_size.as_deref()]).unwrap_or("--").to_string(),
        },
        uptime: match health.uptime_seconds.filter(|secs| *secs > 0) {
            Some(secs) => format_uptime(secs),
            None => pick([health.uptime.as_deref()]).unwrap_or("--").to_string(),
        },
        records: format_number(health.record_total()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-02-18T12:00:00Z").expect("now")
    }

    fn instance(value: Value) -> Instance {
        serde_json::from_value(value).expect("instance")
    }

    #[test]
    fn instance_card_falls_back_through_aliases() {
        let inst = instance(json!({
            "machine_name": "forge-02",
            "project_slug": "crimson",
            "current_brief": "BRIEF-7",
            "current_phase": "implementing",
            "last_heartbeat": "2026-02-18T11:59:30Z"
        }));
        let card = instance_card(&inst, 3, now());
        assert_eq!(card.id, "inst-3");
        assert_eq!(card.hostname, "forge-02");
        assert_eq!(card.project, "crimson");
        assert_eq!(card.brief, "BRIEF-7");
        assert_eq!(card.phase, "IMPLEMENTING");
        assert!(card.active);
        assert!(!card.team_lead);
        assert_eq!(card.elapsed, "30s ago");
        assert_eq!(
            card.steps,
            vec![
                ("plan", PhaseStep::Done),
                ("build", PhaseStep::Active),
                ("test", PhaseStep::Pending),
                ("review", PhaseStep::Pending),
                ("done", PhaseStep::Pending),
            ]
        );
    }

    #[test]
    fn explicit_status_wins_over_heartbeat() {
        let stale = instance(json!({"last_heartbeat_at": "2026-02-18T10:00:00Z"}));
        assert!(!stale.is_active(now()));
        let idle = instance(json!({"status": "idle", "last_heartbeat_at": "2026-02-18T11:59:59Z"}));
        assert!(!idle.is_active(now()));
        let active = instance(json!({"status": "active"}));
        assert!(active.is_active(now()));
        assert!(!instance(json!({})).is_active(now()));
    }

    #[test]
    fn team_lead_when_flagged_or_has_teammates() {
        let lead = instance(json!({
            "instance_id": "lead-1",
            "teammates": [{"brief": "B-1", "phase": "testing"}, {"name": "scout"}]
        }));
        let card = instance_card(&lead, 0, now());
        assert!(card.team_lead);
        assert_eq!(card.id, "lead-1");
        assert_eq!(card.team_name, "parallel-hunt");
        assert_eq!(card.teammates[0].name, "Teammate 1");
        assert_eq!(card.teammates[0].phase, "TESTING");
        assert_eq!(card.teammates[1].name, "scout");
        assert_eq!(card.teammates[1].phase, "--");
        assert!(card.teammates[1]
            .steps
            .iter()
            .all(|(_, step)| *step == PhaseStep::Pending));

        assert!(instance(json!({"is_team_lead": true})).is_team_lead());
    }

    #[test]
    fn live_and_status_counts() {
        let instances: Vec<Instance> = parse_list(
            &json!([{"status": "active"}, {"status": "idle"}, {"status": "idle"}, {"status": "offline"}, {}]),
            "instances",
        )
        .expect("list");
        assert_eq!(live_instance_count(&instances), 3);
        assert_eq!(instance_status_counts(&instances), (1, 2));
    }

    #[test]
    fn parse_list_rejects_non_lists() {
        assert!(parse_list::<Instance>(&json!({"other": []}), "instances").is_none());
        assert!(parse_list::<Instance>(&Value::Null, "instances").is_none());
        let list: Vec<Instance> = parse_list(&json!([{"id": 7}, 42]), "instances").expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].key(0), "7");
    }

    #[test]
    fn brain_state_reads_every_slot() {
        let state = BrainState::from_value(&json!({
            "health": {"version": "1.2.0"},
            "instances": {"instances": [{"status": "active"}]},
            "projects": [],
            "briefs": null,
            "latency_ms": 42
        }));
        assert!(state.has_data());
        assert_eq!(state.instances().len(), 1);
        assert!(state.projects.is_some());
        assert!(state.briefs.is_none());
        assert!(state.sessions.is_none());
        assert_eq!(state.latency_ms, Some(42));
        assert!(!BrainState::from_value(&json!({})).has_data());
    }

    #[test]
    fn project_cards_split_csv_and_cap_tags() {
        let project: Project = serde_json::from_value(json!({
            "name": "Crimson",
            "slug": "crimson-arena",
            "status": "active",
            "tech_stack": "rust, tokio ,ratatui,serde,chrono,tracing",
            "updated_at": "2026-02-18T11:00:00Z"
        }))
        .expect("project");
        let card = project_card(&project, now());
        assert!(card.active);
        assert_eq!(card.slug.as_deref(), Some("crimson-arena"));
        assert_eq!(card.tags, vec!["rust", "tokio", "ratatui", "serde", "chrono"]);
        assert_eq!(card.updated.as_deref(), Some("1h ago"));

        let bare: Project = serde_json::from_value(json!({
            "slug": "pulse",
            "technologies": ["go"]
        }))
        .expect("project");
        let card = project_card(&bare, now());
        assert_eq!(card.name, "pulse");
        assert!(card.slug.is_some());
        assert!(!card.active);
        assert_eq!(card.tags, vec!["go"]);
    }

    #[test]
    fn brief_pills_follow_known_order_then_others() {
        let briefs: Vec<Brief> = parse_list(
            &json!({"briefs": [
                {"status": "Done"},
                {"status": "Archived"},
                {"status": "Ready"},
                {"status": "Done"},
                {}
            ]}),
            "briefs",
        )
        .expect("briefs");
        assert_eq!(
            brief_status_pills(&briefs),
            vec![
                ("Ready".to_string(), 1),
                ("Done".to_string(), 2),
                ("Archived".to_string(), 1),
                ("Unknown".to_string(), 1),
            ]
        );
        assert_eq!(briefs[4].status_label(), "--");
    }

    #[test]
    fn brief_priority_accepts_numbers() {
        let brief: Brief =
            serde_json::from_value(json!({"brief_id": 12, "priority": 1, "type": "feature"}))
                .expect("brief");
        assert_eq!(brief.id_label(), "12");
        assert_eq!(brief.priority.as_deref(), Some("1"));
        assert_eq!(brief.kind.as_deref(), Some("feature"));
        assert_eq!(brief.project_label(), "--");
    }

    #[test]
    fn sessions_group_newest_first() {
        let sessions: Vec<Session> = parse_list(
            &json!([
                {"project": "a", "started_at": "2026-02-10T08:00:00Z"},
                {"project": "b", "created_at": "2026-02-18T09:00:00Z", "goal": "ship"},
                {"project": "c", "timestamp": "2026-02-17T22:00:00Z"},
                {"project": "d", "started_at": "2026-02-18T11:00:00Z", "brief_id": "B-2"}
            ]),
            "sessions",
        )
        .expect("sessions");
        let groups = session_groups(&sessions, now());
        let labels: Vec<&str> = groups.iter().map(|group| group.label).collect();
        assert_eq!(labels, vec!["Today", "Yesterday", "Earlier"]);
        assert_eq!(groups[0].entries[0].project, "d");
        assert_eq!(groups[0].entries[0].brief.as_deref(), Some("B-2"));
        assert_eq!(groups[0].entries[1].summary.as_deref(), Some("ship"));
        assert_eq!(groups[2].entries[0].when, "1w ago");
    }

    #[test]
    fn health_view_sums_counts() {
        let health: BrainHealth = serde_json::from_value(json!({
            "brain_version": "0.9",
            "db_size_bytes": 2048,
            "uptime_seconds": 7260,
            "counts": {"learnings": 1200, "sessions": 34, "bad": "x"}
        }))
        .expect("health");
        let view = health_view(Some(&health), Some(18));
        assert!(view.online);
        assert_eq!(view.version, "0.9");
        assert_eq!(view.latency, "18ms");
        assert_eq!(view.db_size, "2.0 KB");
        assert_eq!(view.uptime, "2h 1m");
        assert_eq!(view.records, "1,234");

        let sparse: BrainHealth =
            serde_json::from_value(json!({"total_records": 9, "db_size": "12 MB"})).expect("health");
        let view = health_view(Some(&sparse), None);
        assert_eq!(view.records, "9");
        assert_eq!(view.db_size, "12 MB");
        assert_eq!(view.latency, "N/A");

        assert!(!health_view(None, Some(5)).online);
    }

    #[test]
    fn phase_normalization() {
        assert_eq!(normalize_phase("Reviewing"), Some("review"));
        assert_eq!(normalize_phase("COMMITTING"), Some("done"));
        assert_eq!(normalize_phase("triage"), None);
    }
}
