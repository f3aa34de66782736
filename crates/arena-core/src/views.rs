//! Read-only projections of [`ArenaState`] consumed by the terminal panels.

use crate::format::{
    format_clock, format_cost, format_duration, format_number, format_tokens, format_uptime, pct,
    slug, time_ago,
};
use crate::pricing::{estimate_cost, model_short_name, CostEstimate, TokenBuckets};
use crate::state::{ArenaState, Compaction, LogEntry, LogKind, DEFAULT_CONTEXT_MAX};
use crate::wire::{AgentStats, Budget, ContextWindow, KnowledgeState, SkillHeatmap, SyncStatus};
use crate::{agent_display_name, AgentProfile, AGENT_PROFILES, ORCHESTRATOR};
use chrono::{DateTime, Utc};

pub const GAUGE_SEGMENTS: u32 = 20;
const DEFAULT_WARNING: f64 = 0.75;
const DEFAULT_CRITICAL: f64 = 0.90;
const REFORMATTING_MS: i64 = 1_200;
const REFORMATTED_MS: i64 = 4_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeLevel {
    Ok,
    Transition,
    Warning,
    Critical,
}

fn filled_segments(percent: f64) -> u32 {
    ((percent / 100.0) * GAUGE_SEGMENTS as f64).round() as u32
}

/// Sums the four token buckets across every agent in the snapshot.
pub fn token_buckets(state: &ArenaState) -> TokenBuckets {
    let Some(snapshot) = &state.snapshot else {
        return TokenBuckets::default();
    };
    snapshot
        .agents
        .values()
        .fold(TokenBuckets::default(), |acc, agent| TokenBuckets {
            input: acc.input.saturating_add(agent.total_input_tokens),
            output: acc.output.saturating_add(agent.total_output_tokens),
            cache_read: acc.cache_read.saturating_add(agent.total_cache_read_tokens),
            cache_create: acc.cache_create.saturating_add(agent.total_cache_create_tokens),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenBreakdown {
    pub buckets: TokenBuckets,
    pub direct_total: u64,
    pub cache_total: u64,
    pub input_pct: f64,
    pub output_pct: f64,
    pub cache_read_pct: f64,
    pub cache_create_pct: f64,
    pub invocations: u64,
}

pub fn token_breakdown(state: &ArenaState) -> TokenBreakdown {
    let buckets = token_buckets(state);
    let direct_total = buckets.direct();
    let cache_total = buckets.cached();
    TokenBreakdown {
        buckets,
        direct_total,
        cache_total,
        input_pct: pct(buckets.input as f64, direct_total as f64),
        output_pct: pct(buckets.output as f64, direct_total as f64),
        cache_read_pct: pct(buckets.cache_read as f64, cache_total as f64),
        cache_create_pct: pct(buckets.cache_create as f64, cache_total as f64),
        invocations: state
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.totals.total_invocations)
            .unwrap_or(0),
    }
}

pub fn current_model(state: &ArenaState) -> Option<&str> {
    state
        .context_window
        .as_ref()
        .and_then(|ctx| ctx.model_id.as_deref())
        .filter(|id| !id.is_empty())
}

pub fn cost_estimate(state: &ArenaState) -> Option<CostEstimate> {
    estimate_cost(state.pricing.as_ref(), current_model(state), token_buckets(state))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostCard {
    pub title: String,
    pub buckets: TokenBuckets,
    pub estimate: CostEstimate,
}

/// `None` when no pricing table is loaded.
pub fn cost_card(state: &ArenaState) -> Option<CostCard> {
    let estimate = cost_estimate(state)?;
    let model = Some(model_short_name(current_model(state)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    Some(CostCard {
        title: format!("{} ({model})", state.range.label()),
        buckets: token_buckets(state),
        estimate,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetGauge {
    pub ratio: f64,
    pub percent: f64,
    pub filled: u32,
    pub level: GaugeLevel,
    pub label: &'static str,
    pub percent_text: String,
    pub count_text: String,
}

pub fn budget_gauge(budget: &Budget) -> BudgetGauge {
    let ceiling = budget.ceiling.max(1);
    let ratio = budget.consumed as f64 / ceiling as f64;
    let percent = (ratio * 100.0).min(100.0);
    let warning = budget
        .warning_threshold
        .filter(|value| *value > 0.0)
        .unwrap_or(DEFAULT_WARNING);
    let critical = budget
        .critical_threshold
        .filter(|value| *value > 0.0)
        .unwrap_or(DEFAULT_CRITICAL);
    let level = if ratio >= critical {
        GaugeLevel::Critical
    } else if ratio >= warning {
        GaugeLevel::Warning
    } else {
        GaugeLevel::Ok
    };
    BudgetGauge {
        ratio,
        percent,
        filled: filled_segments(percent),
        level,
        label: if level == GaugeLevel::Critical {
            "HP CRITICAL"
        } else {
            "SESSION HP"
        },
        percent_text: format!("{percent:.1}%"),
        count_text: format!(
            "{} / {} tokens",
            format_number(budget.consumed),
            format_number(ceiling)
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextGauge {
    pub ratio: f64,
    pub percent: f64,
    pub filled: u32,
    pub level: GaugeLevel,
    pub label: &'static str,
    pub percent_text: String,
    pub count_text: String,
    pub tags: Option<String>,
    pub compacting: bool,
}

pub fn context_gauge(
    ctx: &ContextWindow,
    orchestrator: Option<&AgentStats>,
    compacting: bool,
) -> ContextGauge {
    let max = if ctx.context_max > 0 {
        ctx.context_max
    } else {
        DEFAULT_CONTEXT_MAX
    };
    let ratio = ctx.context_used as f64 / max as f64;
    let percent = (ratio * 100.0).min(100.0);
    let level = if percent >= 90.0 {
        GaugeLevel::Critical
    } else if percent >= 80.0 {
        GaugeLevel::Warning
    } else if percent >= 60.0 {
        GaugeLevel::Transition
    } else {
        GaugeLevel::Ok
    };
    ContextGauge {
        ratio,
        percent,
        filled: filled_segments(percent),
        level,
        label: if percent >= 90.0 {
            "DATA OVERFLOW"
        } else {
            "DATA LOAD"
        },
        percent_text: format!("{percent:.1}%"),
        count_text: format!(
            "{} / {} ctx",
            format_number(ctx.context_used),
            format_number(max)
        ),
        tags: orchestrator.map(|orch| {
            format!(
                "[cache:{}][in:{}][out:{}]",
                format_tokens(orch.total_cache_read_tokens),
                format_tokens(orch.total_input_tokens),
                format_tokens(orch.total_output_tokens)
            )
        }),
        compacting,
    }
}

pub fn state_context_gauge(state: &ArenaState, now: DateTime<Utc>) -> Option<ContextGauge> {
    let ctx = state.context_window.as_ref()?;
    let orchestrator = state
        .snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.agents.get(ORCHESTRATOR));
    Some(context_gauge(
        ctx,
        orchestrator,
        is_compacting(state.compaction.as_ref(), now),
    ))
}

fn compaction_elapsed_ms(compaction: &Compaction, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(compaction.detected_at)
        .num_milliseconds()
}

pub fn is_compacting(compaction: Option<&Compaction>, now: DateTime<Utc>) -> bool {
    compaction
        .map(|compaction| (0..REFORMATTING_MS).contains(&compaction_elapsed_ms(compaction, now)))
        .unwrap_or(false)
}

/// Overlay text shown while a compaction plays out, `None` once it has faded.
pub fn compaction_notice(compaction: Option<&Compaction>, now: DateTime<Utc>) -> Option<&'static str> {
    let elapsed = compaction_elapsed_ms(compaction?, now);
    if elapsed < 0 {
        None
    } else if elapsed < REFORMATTING_MS {
        Some("> REFORMATTING DATA...")
    } else if elapsed < REFORMATTED_MS {
        Some("> DATA REFORMATTED")
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vital {
    pub text: String,
    pub level: GaugeLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompactVitals {
    pub hp: Option<Vital>,
    pub ctx: Option<Vital>,
    pub sync: Option<Vital>,
}

pub fn compact_vitals(state: &ArenaState) -> CompactVitals {
    let hp = state
        .snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.budget.as_ref())
        .map(|budget| {
            let ratio = budget.consumed as f64 / budget.ceiling.max(1) as f64;
            Vital {
                text: format!("{:.0}%", (ratio * 100.0).min(100.0)),
                level: threshold_level(ratio, 0.75, 0.9),
            }
        });
    let ctx = state
        .context_window
        .as_ref()
        .filter(|ctx| ctx.context_max > 0)
        .map(|ctx| {
            let ratio = ctx.context_used as f64 / ctx.context_max as f64;
            Vital {
                text: format!("{:.0}%", (ratio * 100.0).min(100.0)),
                level: threshold_level(ratio, 0.8, 0.9),
            }
        });
    let sync = state.sync_status.as_ref().map(|status| Vital {
        text: status.status_label(),
        level: if status.is_online() {
            GaugeLevel::Ok
        } else {
            GaugeLevel::Critical
        },
    });
    CompactVitals { hp, ctx, sync }
}

fn threshold_level(ratio: f64, warning: f64, critical: f64) -> GaugeLevel {
    if ratio >= critical {
        GaugeLevel::Critical
    } else if ratio >= warning {
        GaugeLevel::Warning
    } else {
        GaugeLevel::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Active,
    HasData,
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterCard {
    pub profile: &'static AgentProfile,
    pub tier: u64,
    pub invocations: u64,
    pub runs_label: String,
    pub status: AgentStatus,
    pub timer: Option<String>,
}

/// One card per pipeline stage, in pipeline order.
pub fn roster(state: &ArenaState, now: DateTime<Utc>) -> Vec<RosterCard> {
    AGENT_PROFILES
        .iter()
        .map(|profile| {
            let stats = state
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.agents.get(profile.key));
            let invocations = stats.map(|stats| stats.invocations).unwrap_or(0);
            let unit = if profile.key == ORCHESTRATOR {
                "turns"
            } else {
                "runs"
            };
            let elapsed = state.active_elapsed(profile.key, now);
            let status = if elapsed.is_some() {
                AgentStatus::Active
            } else if invocations > 0 {
                AgentStatus::HasData
            } else {
                AgentStatus::Idle
            };
            RosterCard {
                profile,
                tier: stats
                    .and_then(|stats| stats.level.as_ref())
                    .map(|level| level.tier)
                    .unwrap_or(0),
                invocations,
                runs_label: format!("{invocations} {unit}"),
                status,
                timer: elapsed.map(|secs| format_duration(secs as f64)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverallStats {
    pub invocations: String,
    pub tokens: String,
    pub cost: String,
    pub uptime: String,
}

pub fn overall_stats(state: &ArenaState, now: DateTime<Utc>) -> OverallStats {
    let totals = state
        .snapshot
        .as_ref()
        .map(|snapshot| snapshot.totals.clone())
        .unwrap_or_default();
    let total_tokens = totals
        .total_input_tokens
        .saturating_add(totals.total_output_tokens)
        .saturating_add(totals.total_cache_tokens);
    let uptime = state
        .brain
        .health
        .as_ref()
        .and_then(|health| health.uptime_seconds)
        .filter(|secs| *secs > 0)
        .unwrap_or_else(|| {
            now.signed_duration_since(state.started_at)
                .num_seconds()
                .max(0) as u64
        });
    OverallStats {
        invocations: format_number(totals.total_invocations),
        tokens: format_tokens(total_tokens),
        cost: cost_estimate(state)
            .map(|cost| format_cost(cost.total))
            .unwrap_or_else(|| "$0.00".to_string()),
        uptime: format_uptime(uptime),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillBar {
    pub name: String,
    pub count: u64,
    pub width_pct: u64,
}

/// Most used skills first. Every bar keeps a minimum visible width.
pub fn skill_bars(heatmap: &SkillHeatmap) -> Vec<SkillBar> {
    let mut skills: Vec<(&String, &u64)> = heatmap.skills.iter().collect();
    skills.sort_by(|a, b| b.1.cmp(a.1));
    let max = skills
        .first()
        .map(|(_, count)| **count)
        .filter(|count| *count > 0)
        .unwrap_or(1);
    skills
        .into_iter()
        .map(|(name, count)| SkillBar {
            name: name.clone(),
            count: *count,
            width_pct: ((*count as f64 / max as f64) * 100.0).round().max(2.0) as u64,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncPanel {
    pub status: String,
    pub online: bool,
    pub last_push: String,
    pub last_pull: String,
    pub queue_depth: u64,
    pub queue_level: GaugeLevel,
}

pub fn sync_panel(status: &SyncStatus, now: DateTime<Utc>) -> SyncPanel {
    let queue_level = match status.queue_depth {
        0 => GaugeLevel::Ok,
        depth if depth > 10 => GaugeLevel::Critical,
        _ => GaugeLevel::Warning,
    };
    SyncPanel {
        status: status.status_label(),
        online: status.is_online(),
        last_push: time_ago(status.last_push.as_deref(), now),
        last_pull: time_ago(status.last_pull.as_deref(), now),
        queue_depth: status.queue_depth,
        queue_level,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRow {
    pub title: String,
    pub category: String,
    pub category_slug: String,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgePanel {
    pub learnings: String,
    pub errors: String,
    pub patterns: String,
    pub recent: Vec<KnowledgeRow>,
}

pub fn knowledge_panel(knowledge: &KnowledgeState, now: DateTime<Utc>) -> KnowledgePanel {
    KnowledgePanel {
        learnings: format_number(knowledge.learnings_count),
        errors: format_number(knowledge.errors_count),
        patterns: format_number(knowledge.patterns_count),
        recent: knowledge
            .recent
            .iter()
            .map(|item| {
                let category = item
                    .category
                    .as_deref()
                    .filter(|category| !category.is_empty())
                    .unwrap_or("general");
                KnowledgeRow {
                    title: item
                        .title
                        .as_deref()
                        .filter(|title| !title.is_empty())
                        .unwrap_or("--")
                        .to_string(),
                    category: category.to_string(),
                    category_slug: slug(category),
                    age: time_ago(item.created_at.as_deref(), now),
                }
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub kind: LogKind,
    pub time: String,
    pub subject: String,
    pub text: String,
}

pub fn log_line(entry: &LogEntry) -> LogLine {
    let time = format_clock(entry.ts.as_deref());
    let agent = agent_display_name(entry.agent.as_deref());
    let (subject, text) = match entry.kind {
        LogKind::Start => (agent, "deployed to battle".to_string()),
        LogKind::Stop => {
            let cached = if entry.cached_tokens > 0 {
                format!(" (+ {} cached)", format_number(entry.cached_tokens))
            } else {
                String::new()
            };
            let duration = entry
                .duration_s
                .filter(|secs| *secs > 0.0)
                .map(format_duration)
                .unwrap_or_else(|| "--".to_string());
            (
                agent,
                format!(
                    "completed \u{2014} {} tokens{cached} ({duration})",
                    format_number(entry.direct_tokens)
                ),
            )
        }
        LogKind::Skill => (
            format!(
                "/{}",
                entry
                    .skill_name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .unwrap_or("unknown")
            ),
            "invoked".to_string(),
        ),
        LogKind::Other => (
            agent,
            Some(entry.event.as_str())
                .filter(|event| !event.is_empty())
                .unwrap_or("event")
                .to_string(),
        ),
    };
    LogLine {
        kind: entry.kind,
        time,
        subject,
        text,
    }
}
