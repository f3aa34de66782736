use crate::brain::BrainState;
use crate::pricing::PricingTable;
use crate::range::TimeRange;
use crate::wire::{
    AgentEvent, ContextWindow, EventKind, KnowledgeState, ServerMsg, SkillHeatmap, StateSnapshot,
    SyncStatus, TeamStatus,
};
use crate::ORCHESTRATOR;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, VecDeque};

pub const MAX_BATTLE_LOG: usize = 50;
pub const DEFAULT_CONTEXT_MAX: u64 = 200_000;
const COMPACTION_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Ignored,
    /// A snapshot arrived for a different range than the active one.
    NeedsRefetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Start,
    Stop,
    Skill,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub ts: Option<String>,
    pub agent: Option<String>,
    pub event: String,
    pub skill_name: Option<String>,
    pub direct_tokens: u64,
    pub cached_tokens: u64,
    pub duration_s: Option<f64>,
}

impl LogEntry {
    pub fn from_event(event: &AgentEvent) -> Self {
        let kind = match event.kind() {
            EventKind::Start => LogKind::Start,
            EventKind::Stop => LogKind::Stop,
            EventKind::SkillInvoke => LogKind::Skill,
            EventKind::Other => LogKind::Other,
        };
        Self {
            kind,
            ts: event.ts.clone(),
            agent: event.agent.clone(),
            event: event.event.clone(),
            skill_name: event.skill_name.clone(),
            direct_tokens: event.direct_tokens(),
            cached_tokens: event.cached_tokens(),
            duration_s: event.duration_s,
        }
    }

    pub fn skill(skill_name: &str, ts: String) -> Self {
        Self {
            kind: LogKind::Skill,
            ts: Some(ts),
            agent: Some("skill".to_string()),
            event: "skill_invoke".to_string(),
            skill_name: Some(skill_name.to_string()),
            direct_tokens: 0,
            cached_tokens: 0,
            duration_s: None,
        }
    }
}

/// A sharp drop in orchestrator context occupancy between two stop events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compaction {
    pub detected_at: DateTime<Utc>,
    pub previous_used: u64,
    pub current_used: u64,
}

/// Client-side mirror of the pipeline state.
#[derive(Debug, Clone)]
pub struct ArenaState {
    pub snapshot: Option<StateSnapshot>,
    pub context_window: Option<ContextWindow>,
    pub active_timers: BTreeMap<String, DateTime<Utc>>,
    pub battle_log: VecDeque<LogEntry>,
    pub pricing: Option<PricingTable>,
    pub sync_status: Option<SyncStatus>,
    pub team_status: Option<TeamStatus>,
    pub knowledge: Option<KnowledgeState>,
    pub brain: BrainState,
    pub brain_available: bool,
    pub compaction: Option<Compaction>,
    pub range: TimeRange,
    pub connected: bool,
    pub started_at: DateTime<Utc>,
    pub last_update: Option<DateTime<Utc>>,
    prev_context_used: u64,
}

impl ArenaState {
    pub fn new(range: TimeRange, started_at: DateTime<Utc>) -> Self {
        Self {
            snapshot: None,
            context_window: None,
            active_timers: BTreeMap::new(),
            battle_log: VecDeque::with_capacity(MAX_BATTLE_LOG),
            pricing: None,
            sync_status: None,
            team_status: None,
            knowledge: None,
            brain: BrainState::default(),
            brain_available: false,
            compaction: None,
            range,
            connected: false,
            started_at,
            last_update: None,
            prev_context_used: 0,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Returns true when the range actually changed.
    pub fn set_range(&mut self, range: TimeRange) -> bool {
        if self.range == range {
            return false;
        }
        self.range = range;
        true
    }

    pub fn set_pricing(&mut self, table: Option<PricingTable>) {
        self.pricing = table;
    }

    pub fn set_sync_status(&mut self, status: SyncStatus) {
        self.sync_status = Some(status);
    }

    pub fn set_team_status(&mut self, status: TeamStatus) {
        self.team_status = Some(status);
    }

    pub fn set_knowledge(&mut self, knowledge: KnowledgeState) {
        self.knowledge = Some(knowledge);
    }

    pub fn is_active(&self, agent: &str) -> bool {
        self.active_timers.contains_key(agent)
    }

    /// Whole seconds since the agent's local start, if it is running.
    pub fn active_elapsed(&self, agent: &str, now: DateTime<Utc>) -> Option<i64> {
        self.active_timers
            .get(agent)
            .map(|started| now.signed_duration_since(*started).num_seconds().max(0))
    }

    pub fn apply_snapshot(&mut self, mut snapshot: StateSnapshot, now: DateTime<Utc>) {
        for (name, stats) in snapshot.agents.iter_mut() {
            stats.active = self.active_timers.contains_key(name);
        }
        if let Some(window) = &snapshot.context_window {
            self.context_window = Some(window.clone());
        }
        if !snapshot.recent_events.is_empty() {
            self.battle_log = snapshot
                .recent_events
                .iter()
                .take(MAX_BATTLE_LOG)
                .map(LogEntry::from_event)
                .collect();
        }
        self.snapshot = Some(snapshot);
        self.last_update = Some(now);
    }

    pub fn apply_event(&mut self, event: &AgentEvent, now: DateTime<Utc>) -> ApplyOutcome {
        match event.kind() {
            EventKind::Start => self.on_agent_start(event, now),
            EventKind::Stop => {
                self.on_agent_stop(event, now);
                if event.agent_name() == Some(ORCHESTRATOR) && event.context_max > 0 {
                    self.check_compaction(event.context_used, now);
                    self.context_window = Some(ContextWindow {
                        context_used: event.context_used,
                        context_max: event.context_max,
                        context_remaining: event.context_remaining,
                        model_id: event.model_id.clone(),
                    });
                }
            }
            EventKind::SkillInvoke | EventKind::Other => {}
        }

        if self.range.matches(event.timestamp(), now) {
            self.push_log(LogEntry::from_event(event));
        }
        self.last_update = Some(now);
        ApplyOutcome::Applied
    }

    fn on_agent_start(&mut self, event: &AgentEvent, now: DateTime<Utc>) {
        let Some(agent) = event.agent_name() else {
            return;
        };
        if let Some(stats) = self
            .snapshot
            .as_mut()
            .and_then(|snapshot| snapshot.agents.get_mut(agent))
        {
            stats.active = true;
        }
        self.active_timers.insert(agent.to_string(), now);
    }

    fn on_agent_stop(&mut self, event: &AgentEvent, now: DateTime<Utc>) {
        let Some(agent) = event.agent_name() else {
            return;
        };
        let in_range = self.range.matches(event.timestamp(), now);

        if let Some(snapshot) = self.snapshot.as_mut() {
            // The budget tracks the whole session regardless of the range filter.
            if let Some(budget) = snapshot.budget.as_mut() {
                budget.consumed = budget.consumed.saturating_add(event.total_tokens());
                budget.ratio = budget.consumed as f64 / budget.ceiling.max(1) as f64;
            }

            if in_range {
                if let Some(stats) = snapshot.agents.get_mut(agent) {
                    stats.total_input_tokens = stats.total_input_tokens.saturating_add(event.input_tokens);
                    stats.total_output_tokens =
                        stats.total_output_tokens.saturating_add(event.output_tokens);
                    stats.total_cache_read_tokens =
                        stats.total_cache_read_tokens.saturating_add(event.cache_read);
                    stats.total_cache_create_tokens =
                        stats.total_cache_create_tokens.saturating_add(event.cache_create);
                    stats.invocations = stats.invocations.saturating_add(1);
                    stats.last_used = Some(
                        event
                            .timestamp()
                            .map(str::to_string)
                            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
                    );
                }
                let totals = &mut snapshot.totals;
                totals.total_invocations = totals.total_invocations.saturating_add(1);
                totals.total_input_tokens = totals.total_input_tokens.saturating_add(event.input_tokens);
                totals.total_output_tokens = totals.total_output_tokens.saturating_add(event.output_tokens);
                totals.total_cache_tokens = totals.total_cache_tokens.saturating_add(event.cached_tokens());
            }

            if let Some(stats) = snapshot.agents.get_mut(agent) {
                stats.active = false;
            }
        }

        self.active_timers.remove(agent);
    }

    fn check_compaction(&mut self, new_used: u64, now: DateTime<Utc>) {
        let prev_used = self.prev_context_used;
        self.prev_context_used = new_used;
        if prev_used > 0 && new_used > 0 && (new_used as f64) < prev_used as f64 * COMPACTION_RATIO {
            self.compaction = Some(Compaction {
                detected_at: now,
                previous_used: prev_used,
                current_used: new_used,
            });
        }
    }

    pub fn apply_skill_event(
        &mut self,
        skill_name: &str,
        ts: Option<&str>,
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        if skill_name.is_empty() {
            return ApplyOutcome::Ignored;
        }
        let Some(snapshot) = self.snapshot.as_mut() else {
            return ApplyOutcome::Ignored;
        };
        let heatmap = snapshot.skill_heatmap.get_or_insert_with(SkillHeatmap::default);
        let count = heatmap.skills.entry(skill_name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        heatmap.total = heatmap.total.saturating_add(1);

        let ts = ts
            .filter(|ts| !ts.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.push_log(LogEntry::skill(skill_name, ts));
        self.last_update = Some(now);
        ApplyOutcome::Applied
    }

    pub fn apply_message(&mut self, msg: ServerMsg, now: DateTime<Utc>) -> ApplyOutcome {
        match msg {
            ServerMsg::State(snapshot) => {
                let snapshot_range = snapshot.range.as_deref().map(TimeRange::parse_lenient);
                if snapshot_range.is_some_and(|range| range != self.range) {
                    return ApplyOutcome::NeedsRefetch;
                }
                self.apply_snapshot(*snapshot, now);
            }
            ServerMsg::Event(event) => {
                return self.apply_event(&event, now);
            }
            ServerMsg::BrainState(brain) => {
                self.brain = brain;
                self.brain_available = true;
            }
            ServerMsg::BrainHealth(health) => {
                self.brain.health = health;
                self.brain_available = true;
            }
            ServerMsg::BrainInstances(instances) => self.brain.instances = instances,
            ServerMsg::BrainProjects(projects) => self.brain.projects = projects,
            ServerMsg::BrainBriefs(briefs) => self.brain.briefs = briefs,
            ServerMsg::BrainSessions(sessions) => self.brain.sessions = sessions,
            ServerMsg::SyncStatus(status) => self.set_sync_status(status),
            ServerMsg::TeamStatus(status) => self.set_team_status(status),
            ServerMsg::BrainKnowledge(knowledge) => self.set_knowledge(knowledge),
            ServerMsg::SkillEvent(payload) => {
                let skill = payload.skill_name.unwrap_or_default();
                return self.apply_skill_event(&skill, payload.ts.as_deref(), now);
            }
            ServerMsg::Pong | ServerMsg::Unknown(_) => return ApplyOutcome::Ignored,
        }
        ApplyOutcome::Applied
    }

    pub fn apply_brain_poll(&mut self, poll: BrainState) {
        self.brain_available = poll.has_data();
        self.brain = poll;
    }

    fn push_log(&mut self, entry: LogEntry) {
        self.battle_log.push_front(entry);
        self.battle_log.truncate(MAX_BATTLE_LOG);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::parse_timestamp;
    use crate::wire::{AgentStats, Budget};

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-02-18T12:00:00Z").expect("now")
    }

    fn snapshot() -> StateSnapshot {
        let mut snapshot = StateSnapshot {
            budget: Some(Budget {
                consumed: 1_000,
                ceiling: 10_000,
                ratio: 0.1,
                ..Budget::default()
            }),
            ..StateSnapshot::default()
        };
        for agent in ["orchestrator", "forger"] {
            snapshot.agents.insert(
                agent.to_string(),
                AgentStats {
                    active: true,
                    ..AgentStats::default()
                },
            );
        }
        snapshot
    }

    fn event(kind: &str, agent: &str, ts: &str) -> AgentEvent {
        AgentEvent {
            event: kind.to_string(),
            agent: Some(agent.to_string()),
            ts: Some(ts.to_string()),
            ..AgentEvent::default()
        }
    }

    fn stop(agent: &str, ts: &str) -> AgentEvent {
        AgentEvent {
            input_tokens: 100,
            output_tokens: 50,
            cache_read: 20,
            cache_create: 5,
            ..event("stop", agent, ts)
        }
    }

    fn loaded() -> ArenaState {
        let mut state = ArenaState::new(TimeRange::Today, now());
        state.apply_snapshot(snapshot(), now());
        state
    }

    #[test]
    fn snapshot_overrides_server_active_flags_with_local_timers() {
        let mut state = ArenaState::new(TimeRange::Today, now());
        state.apply_event(&event("start", "forger", "2026-02-18T11:00:00Z"), now());
        state.apply_snapshot(snapshot(), now());

        let agents = &state.snapshot.as_ref().expect("snapshot").agents;
        assert!(agents["forger"].active);
        assert!(!agents["orchestrator"].active);
    }

    #[test]
    fn start_then_stop_clears_timer() {
        let mut state = loaded();
        let started = now();
        state.apply_event(&event("start", "forger", "2026-02-18T11:59:00Z"), started);
        assert!(state.is_active("forger"));
        assert_eq!(
            state.active_elapsed("forger", started + chrono::Duration::seconds(42)),
            Some(42)
        );

        state.apply_event(&stop("forger", "2026-02-18T11:59:30Z"), now());
        assert!(!state.is_active("forger"));
        let forger = &state.snapshot.as_ref().expect("snapshot").agents["forger"];
        assert!(!forger.active);
        assert_eq!(forger.invocations, 1);
        assert_eq!(forger.total_cache_read_tokens, 20);
        assert_eq!(forger.last_used.as_deref(), Some("2026-02-18T11:59:30Z"));
    }

    #[test]
    fn stop_updates_budget_and_totals() {
        let mut state = loaded();
        state.apply_event(&stop("forger", "2026-02-18T11:00:00Z"), now());

        let snapshot = state.snapshot.as_ref().expect("snapshot");
        let budget = snapshot.budget.as_ref().expect("budget");
        assert_eq!(budget.consumed, 1_175);
        assert!((budget.ratio - 0.1175).abs() < 1e-9);
        assert_eq!(snapshot.totals.total_invocations, 1);
        assert_eq!(snapshot.totals.total_input_tokens, 100);
        assert_eq!(snapshot.totals.total_output_tokens, 50);
        assert_eq!(snapshot.totals.total_cache_tokens, 25);
        assert_eq!(state.battle_log.len(), 1);
        assert_eq!(state.battle_log[0].kind, LogKind::Stop);
    }

    #[test]
    fn oversized_token_counts_saturate() {
        let mut state = loaded();
        let frame = r#"{"type":"event","data":{"ts":"2026-02-18T11:00:00Z","event":"stop","agent":"orchestrator","input_tokens":18446744073709551615,"output_tokens":1}}"#;
        let msg = crate::wire::decode_server_msg(frame).expect("decode");
        assert_eq!(state.apply_message(msg, now()), ApplyOutcome::Applied);
        state.apply_event(&stop("orchestrator", "2026-02-18T11:00:05Z"), now());

        let snapshot = state.snapshot.as_ref().expect("snapshot");
        let budget = snapshot.budget.as_ref().expect("budget");
        assert_eq!(budget.consumed, u64::MAX);
        assert_eq!(snapshot.totals.total_input_tokens, u64::MAX);
        assert_eq!(snapshot.totals.total_invocations, 2);
        let orchestrator = &snapshot.agents["orchestrator"];
        assert_eq!(orchestrator.total_input_tokens, u64::MAX);
        assert_eq!(orchestrator.total_output_tokens, 51);
    }

    #[test]
    fn out_of_range_stop_only_touches_budget() {
        let mut state = loaded();
        state.apply_event(&stop("forger", "2026-02-17T23:00:00Z"), now());

        let snapshot = state.snapshot.as_ref().expect("snapshot");
        assert_eq!(snapshot.budget.as_ref().map(|b| b.consumed), Some(1_175));
        assert_eq!(snapshot.agents["forger"].invocations, 0);
        assert_eq!(snapshot.totals.total_invocations, 0);
        assert!(state.battle_log.is_empty());
    }

    #[test]
    fn zero_ceiling_divides_by_one() {
        let mut state = ArenaState::new(TimeRange::All, now());
        let mut snap = snapshot();
        snap.budget = Some(Budget::default());
        state.apply_snapshot(snap, now());
        state.apply_event(&stop("forger", "2026-02-18T11:00:00Z"), now());
        let budget = state
            .snapshot
            .as_ref()
            .and_then(|s| s.budget.as_ref())
            .expect("budget");
        assert_eq!(budget.ratio, 175.0);
    }

    #[test]
    fn unknown_agents_do_not_grow_the_roster() {
        let mut state = loaded();
        state.apply_event(&stop("scribe", "2026-02-18T11:00:00Z"), now());
        let snapshot = state.snapshot.as_ref().expect("snapshot");
        assert!(!snapshot.agents.contains_key("scribe"));
        assert_eq!(snapshot.totals.total_invocations, 1);
    }

    #[test]
    fn events_without_agent_are_logged_but_not_counted() {
        let mut state = loaded();
        let mut anonymous = stop("forger", "2026-02-18T11:00:00Z");
        anonymous.agent = None;
        state.apply_event(&anonymous, now());
        let snapshot = state.snapshot.as_ref().expect("snapshot");
        assert_eq!(snapshot.totals.total_invocations, 0);
        assert_eq!(snapshot.budget.as_ref().map(|b| b.consumed), Some(1_000));
        assert_eq!(state.battle_log.len(), 1);
    }

    #[test]
    fn orchestrator_stop_replaces_context_and_detects_compaction() {
        let mut state = loaded();
        let first = AgentEvent {
            context_used: 150_000,
            context_max: 200_000,
            model_id: Some("claude-opus-4".to_string()),
            ..stop("orchestrator", "2026-02-18T11:00:00Z")
        };
        state.apply_event(&first, now());
        assert!(state.compaction.is_none());
        assert_eq!(
            state.context_window.as_ref().map(|ctx| ctx.context_used),
            Some(150_000)
        );

        let mild = AgentEvent {
            context_used: 120_000,
            ..first.clone()
        };
        state.apply_event(&mild, now());
        assert!(state.compaction.is_none());

        let compacted = AgentEvent {
            context_used: 40_000,
            ..first.clone()
        };
        let later = now() + chrono::Duration::seconds(5);
        state.apply_event(&compacted, later);
        let compaction = state.compaction.expect("compaction");
        assert_eq!(compaction.previous_used, 120_000);
        assert_eq!(compaction.current_used, 40_000);
        assert_eq!(compaction.detected_at, later);
    }

    #[test]
    fn non_orchestrator_or_zero_max_keeps_context() {
        let mut state = loaded();
        let forger = AgentEvent {
            context_used: 10,
            context_max: 100,
            ..stop("forger", "2026-02-18T11:00:00Z")
        };
        state.apply_event(&forger, now());
        let no_max = AgentEvent {
            context_used: 10,
            ..stop("orchestrator", "2026-02-18T11:00:00Z")
        };
        state.apply_event(&no_max, now());
        assert!(state.context_window.is_none());
    }

    #[test]
    fn battle_log_is_bounded_and_newest_first() {
        let mut state = loaded();
        for idx in 0..60 {
            let mut start = event("start", "forger", "2026-02-18T10:00:00Z");
            start.agent_id = Some(format!("run-{idx}"));
            state.apply_event(&start, now());
        }
        state.apply_event(&stop("sage", "2026-02-18T11:00:00Z"), now());
        assert_eq!(state.battle_log.len(), MAX_BATTLE_LOG);
        assert_eq!(state.battle_log[0].agent.as_deref(), Some("sage"));
    }

    #[test]
    fn snapshot_rebuilds_log_only_when_events_present() {
        let mut state = loaded();
        state.apply_event(&event("start", "forger", "2026-02-18T11:00:00Z"), now());
        state.apply_snapshot(snapshot(), now());
        assert_eq!(state.battle_log.len(), 1);

        let mut with_events = snapshot();
        with_events.recent_events = (0..70)
            .map(|_| event("stop", "architect", "2026-02-18T09:00:00Z"))
            .collect();
        state.apply_snapshot(with_events, now());
        assert_eq!(state.battle_log.len(), MAX_BATTLE_LOG);
        assert_eq!(state.battle_log[0].agent.as_deref(), Some("architect"));
    }

    #[test]
    fn skill_events_need_a_snapshot() {
        let mut empty = ArenaState::new(TimeRange::Today, now());
        assert_eq!(
            empty.apply_skill_event("commit", None, now()),
            ApplyOutcome::Ignored
        );

        let mut state = loaded();
        state.apply_skill_event("commit", Some("2026-02-18T11:00:00Z"), now());
        state.apply_skill_event("commit", None, now());
        state.apply_skill_event("review", None, now());
        let heatmap = state
            .snapshot
            .as_ref()
            .and_then(|s| s.skill_heatmap.as_ref())
            .expect("heatmap");
        assert_eq!(heatmap.skills["commit"], 2);
        assert_eq!(heatmap.total, 3);
        assert_eq!(state.battle_log.len(), 3);
        assert_eq!(state.battle_log[0].kind, LogKind::Skill);
        assert_eq!(
            state.battle_log[2].ts.as_deref(),
            Some("2026-02-18T11:00:00Z")
        );
        assert_eq!(state.apply_skill_event("", None, now()), ApplyOutcome::Ignored);
    }

    #[test]
    fn state_message_for_other_range_requests_refetch() {
        let mut state = ArenaState::new(TimeRange::Week, now());
        let mut snap = snapshot();
        snap.range = Some("today".to_string());
        assert_eq!(
            state.apply_message(ServerMsg::State(Box::new(snap.clone())), now()),
            ApplyOutcome::NeedsRefetch
        );
        assert!(state.snapshot.is_none());

        snap.range = Some("week".to_string());
        assert_eq!(
            state.apply_message(ServerMsg::State(Box::new(snap)), now()),
            ApplyOutcome::Applied
        );
        assert!(state.snapshot.is_some());
    }

    #[test]
    fn brain_messages_fill_slots() {
        let mut state = loaded();
        state.apply_message(ServerMsg::BrainInstances(Some(Vec::new())), now());
        assert!(!state.brain_available);
        assert!(state.brain.instances.is_some());

        state.apply_message(ServerMsg::BrainHealth(None), now());
        assert!(state.brain_available);

        state.apply_brain_poll(BrainState::default());
        assert!(!state.brain_available);
        assert!(state.brain.instances.is_none());

        assert_eq!(
            state.apply_message(ServerMsg::Pong, now()),
            ApplyOutcome::Ignored
        );
    }

    #[test]
    fn set_range_reports_change() {
        let mut state = ArenaState::new(TimeRange::Today, now());
        assert!(!state.set_range(TimeRange::Today));
        assert!(state.set_range(TimeRange::All));
        assert_eq!(state.range, TimeRange::All);
    }
}
