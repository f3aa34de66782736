use crate::app::App;
use crate::config::Page;
use crate::theme::{agent_color, crimson_theme, ArenaTheme};
use arena_core::brain::{
    brief_status_pills, health_view, instance_card, instance_status_counts, live_instance_count,
    project_card, session_groups, InstanceCard, PhaseStep,
};
use arena_core::format::{ellipsize, format_cost, format_rate, format_tokens, slug};
use arena_core::views::{
    budget_gauge, compact_vitals, compaction_notice, cost_card, knowledge_panel, log_line,
    overall_stats, roster, skill_bars, state_context_gauge, sync_panel, token_breakdown,
    AgentStatus, Vital,
};
use arena_core::{agent_profile, ArenaState};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

const MAX_PROJECT_ROWS: usize = 6;
const MAX_SESSION_ROWS: usize = 8;

pub fn render_ui(frame: &mut Frame, app: &App, now: DateTime<Utc>) {
    let size = frame.size();
    let theme = crimson_theme();
    frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), size);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);
    frame.render_widget(render_header(app, theme, now, size.width), layout[0]);
    match app.page {
        Page::Home => render_home(frame, app, theme, now, layout[1]),
        Page::Instances => render_instances(frame, app, theme, now, layout[1]),
    }
    frame.render_widget(render_footer(theme), layout[2]);
    if app.help_open {
        render_help_overlay(frame, theme);
    }
}

fn panel(title: &str, theme: ArenaTheme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.surface))
        .title(Span::styled(
            format!(" {title} "),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn muted_line(text: &str, theme: ArenaTheme) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(theme.muted)))
}

fn render_header(app: &App, theme: ArenaTheme, now: DateTime<Utc>, width: u16) -> Paragraph<'static> {
    let state = &app.state;
    let (dot, link, link_color) = if state.connected {
        ("\u{25cf}", "LIVE", theme.ok)
    } else {
        ("\u{25cb}", "OFFLINE", theme.critical)
    };
    let mut spans = vec![
        Span::styled(
            "CRIMSON ARENA",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{dot} {link}"),
            Style::default().fg(link_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  Range: {}", state.range.label()),
            Style::default().fg(theme.text),
        ),
        Span::styled(
            format!("  Page: {}", app.page.title()),
            Style::default().fg(theme.text),
        ),
    ];
    if state.brain_available {
        let live = live_instance_count(state.brain.instances());
        spans.push(Span::styled(
            format!("  Instances: {live} live"),
            Style::default().fg(if live > 0 { theme.ok } else { theme.muted }),
        ));
    }

    let inner_width = width.saturating_sub(4) as usize;
    let second = if let Some(notice) = compaction_notice(state.compaction.as_ref(), now) {
        Line::from(Span::styled(
            notice,
            Style::default().fg(theme.warn).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(note) = app.status_note.as_deref() {
        Line::from(Span::styled(
            ellipsize(note, inner_width.max(12)),
            Style::default().fg(theme.info),
        ))
    } else {
        muted_line("ready (? help)", theme)
    };

    Paragraph::new(Text::from(vec![Line::from(spans), second]))
        .style(Style::default().fg(theme.text).bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .style(Style::default().bg(theme.bg)),
        )
}

fn render_footer(theme: ArenaTheme) -> Paragraph<'static> {
    Paragraph::new(muted_line(
        " 1 home  2 instances  Tab page  t/w/a range  j/k select  Enter expand  r refresh  ? help  q quit",
        theme,
    ))
    .style(Style::default().bg(theme.bg))
}

fn render_home(frame: &mut Frame, app: &App, theme: ArenaTheme, now: DateTime<Utc>, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Min(4),
        ])
        .split(columns[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Min(4),
        ])
        .split(columns[1]);

    render_budget(frame, &app.state, theme, left[0]);
    render_context(frame, &app.state, theme, now, left[1]);
    frame.render_widget(render_tokens(&app.state, theme), left[2]);
    frame.render_widget(render_cost(&app.state, theme), left[3]);
    frame.render_widget(render_battle_log(&app.state, theme), left[4]);

    frame.render_widget(render_roster(&app.state, theme, now), right[0]);
    frame.render_widget(render_stats(&app.state, theme, now), right[1]);
    frame.render_widget(render_skills(&app.state, theme, right[2].width), right[2]);
    let side = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(right[3]);
    frame.render_widget(render_knowledge(&app.state, theme, now), side[0]);
    frame.render_widget(render_sync(&app.state, theme, now), side[1]);
    frame.render_widget(render_brain(&app.state, theme, now), right[4]);
}

fn render_budget(frame: &mut Frame, state: &ArenaState, theme: ArenaTheme, area: Rect) {
    let budget = state
        .snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.budget.as_ref());
    let Some(budget) = budget else {
        frame.render_widget(
            Paragraph::new(muted_line("awaiting budget", theme)).block(panel("Session HP", theme)),
            area,
        );
        return;
    };
    let gauge = budget_gauge(budget);
    frame.render_widget(
        Gauge::default()
            .block(panel("Session HP", theme))
            .gauge_style(Style::default().fg(theme.level(gauge.level)).bg(theme.bg))
            .ratio(gauge.ratio.clamp(0.0, 1.0))
            .label(format!(
                "{} {} | {}",
                gauge.label, gauge.percent_text, gauge.count_text
            )),
        area,
    );
}

fn render_context(
    frame: &mut Frame,
    state: &ArenaState,
    theme: ArenaTheme,
    now: DateTime<Utc>,
    area: Rect,
) {
    let block = panel("Context", theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let Some(gauge) = state_context_gauge(state, now) else {
        frame.render_widget(Paragraph::new(muted_line("awaiting context data", theme)), inner);
        return;
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);
    let color = if gauge.compacting {
        theme.warn
    } else {
        theme.level(gauge.level)
    };
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(color).bg(theme.bg))
            .ratio(gauge.ratio.clamp(0.0, 1.0))
            .label(format!(
                "{} {} | {}",
                gauge.label, gauge.percent_text, gauge.count_text
            )),
        rows[0],
    );
    if let Some(tags) = gauge.tags {
        frame.render_widget(Paragraph::new(muted_line(&tags, theme)), rows[1]);
    }
}

fn render_tokens(state: &ArenaState, theme: ArenaTheme) -> Paragraph<'static> {
    let breakdown = token_breakdown(state);
    let buckets = breakdown.buckets;
    let heading = |label: &str, total: u64| {
        Line::from(vec![
            Span::styled(
                format!("{label:<8}"),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format_tokens(total), Style::default().fg(theme.text)),
        ])
    };
    let row = |label: &str, tokens: u64, pct: f64| {
        Line::from(vec![
            Span::styled(format!("  {label:<8}"), Style::default().fg(theme.muted)),
            Span::styled(format!("{:>8}", format_tokens(tokens)), Style::default().fg(theme.text)),
            Span::styled(format!("{pct:>6.0}%"), Style::default().fg(theme.muted)),
        ])
    };
    Paragraph::new(vec![
        heading("DIRECT", breakdown.direct_total),
        row("input", buckets.input, breakdown.input_pct),
        row("output", buckets.output, breakdown.output_pct),
        heading("CACHE", breakdown.cache_total),
        row("read", buckets.cache_read, breakdown.cache_read_pct),
        row("create", buckets.cache_create, breakdown.cache_create_pct),
        muted_line(&format!("{} invocations", breakdown.invocations), theme),
    ])
    .block(panel("Tokens", theme))
}

fn render_cost(state: &ArenaState, theme: ArenaTheme) -> Paragraph<'static> {
    let Some(card) = cost_card(state) else {
        return Paragraph::new(muted_line("pricing unavailable", theme)).block(panel("Cost", theme));
    };
    let estimate = card.estimate;
    let rates = estimate.rates;
    let row = |label: &str, tokens: u64, rate: f64, cost: f64| {
        Line::from(vec![
            Span::styled(format!("{label:<8}"), Style::default().fg(theme.muted)),
            Span::styled(format!("{:>8}", format_tokens(tokens)), Style::default().fg(theme.text)),
            Span::styled(format!(" @ {:>10}", format_rate(rate)), Style::default().fg(theme.muted)),
            Span::styled(format!("  {}", format_cost(cost)), Style::default().fg(theme.text)),
        ])
    };
    Paragraph::new(vec![
        Line::from(Span::styled(
            card.title.clone(),
            Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
        )),
        row("input", card.buckets.input, rates.input(), estimate.input),
        row("output", card.buckets.output, rates.output(), estimate.output),
        row("c.read", card.buckets.cache_read, rates.cache_read(), estimate.cache_read),
        row("c.write", card.buckets.cache_create, rates.cache_create(), estimate.cache_create),
        Line::from(vec![
            Span::styled("total   ", Style::default().fg(theme.accent)),
            Span::styled(
                format_cost(estimate.total),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
    ])
    .block(panel("Cost", theme))
}

fn render_battle_log(state: &ArenaState, theme: ArenaTheme) -> Paragraph<'static> {
    if state.battle_log.is_empty() {
        return Paragraph::new(muted_line("no activity yet", theme)).block(panel("Battle Log", theme));
    }
    let lines: Vec<Line<'static>> = state
        .battle_log
        .iter()
        .map(|entry| {
            let line = log_line(entry);
            let subject_color = entry
                .agent
                .as_deref()
                .and_then(agent_profile)
                .map(agent_color)
                .unwrap_or_else(|| theme.log_kind(line.kind));
            Line::from(vec![
                Span::styled(format!("{} ", line.time), Style::default().fg(theme.muted)),
                Span::styled(
                    line.subject,
                    Style::default().fg(subject_color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(line.text, Style::default().fg(theme.log_kind(line.kind))),
            ])
        })
        .collect();
    Paragraph::new(lines).block(panel("Battle Log", theme))
}

fn render_roster(state: &ArenaState, theme: ArenaTheme, now: DateTime<Utc>) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = roster(state, now)
        .into_iter()
        .map(|card| {
            let color = agent_color(card.profile);
            let status = match card.status {
                AgentStatus::Active => format!(
                    "ACTIVE {}",
                    card.timer.as_deref().unwrap_or("0s")
                ),
                AgentStatus::HasData => "ready".to_string(),
                AgentStatus::Idle => "idle".to_string(),
            };
            Line::from(vec![
                Span::styled(
                    format!("[{}] {} ", card.profile.monogram, card.profile.crest),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("{:<13}", card.profile.display),
                    Style::default().fg(color),
                ),
                Span::styled(format!("T{} ", card.tier), Style::default().fg(theme.muted)),
                Span::styled(format!("{:<10}", card.runs_label), Style::default().fg(theme.text)),
                Span::styled(status, Style::default().fg(theme.agent_status(card.status))),
            ])
        })
        .collect();
    Paragraph::new(lines).block(panel("Roster", theme))
}

fn render_stats(state: &ArenaState, theme: ArenaTheme, now: DateTime<Utc>) -> Paragraph<'static> {
    let stats = overall_stats(state, now);
    let field = |label: &str, value: String| {
        vec![
            Span::styled(format!("{label} "), Style::default().fg(theme.muted)),
            Span::styled(
                format!("{value}  "),
                Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
            ),
        ]
    };
    let mut spans = field("Runs", stats.invocations);
    spans.extend(field("Tokens", stats.tokens));
    spans.extend(field("Cost", stats.cost));
    spans.extend(field("Up", stats.uptime));
    Paragraph::new(Line::from(spans)).block(panel("Stats", theme))
}

fn render_skills(state: &ArenaState, theme: ArenaTheme, width: u16) -> Paragraph<'static> {
    let heatmap = state
        .snapshot
        .as_ref()
        .and_then(|snapshot| snapshot.skill_heatmap.as_ref());
    let bars = heatmap.map(skill_bars).unwrap_or_default();
    if bars.is_empty() {
        return Paragraph::new(muted_line("no skills invoked", theme)).block(panel("Skills", theme));
    }
    let title = format!(
        "Skills \u{b7} {} total",
        heatmap.map(|heatmap| heatmap.total).unwrap_or_default()
    );
    let bar_room = width.saturating_sub(26).max(4) as u64;
    let lines: Vec<Line<'static>> = bars
        .into_iter()
        .map(|bar| {
            let cells = (bar.width_pct * bar_room / 100).max(1) as usize;
            Line::from(vec![
                Span::styled(
                    format!("{:<14}", ellipsize(&bar.name, 14)),
                    Style::default().fg(theme.text),
                ),
                Span::styled("\u{2588}".repeat(cells), Style::default().fg(theme.accent)),
                Span::styled(format!(" {}", bar.count), Style::default().fg(theme.muted)),
            ])
        })
        .collect();
    Paragraph::new(lines).block(panel(&title, theme))
}

fn render_knowledge(state: &ArenaState, theme: ArenaTheme, now: DateTime<Utc>) -> Paragraph<'static> {
    let Some(knowledge) = state.knowledge.as_ref() else {
        return Paragraph::new(muted_line("no knowledge data", theme)).block(panel("Knowledge", theme));
    };
    let panel_view = knowledge_panel(knowledge, now);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} learnings  ", panel_view.learnings), Style::default().fg(theme.ok)),
        Span::styled(format!("{} errors  ", panel_view.errors), Style::default().fg(theme.critical)),
        Span::styled(format!("{} patterns", panel_view.patterns), Style::default().fg(theme.info)),
    ])];
    for row in panel_view.recent {
        lines.push(Line::from(vec![
            Span::styled(format!("[{}] ", row.category_slug), Style::default().fg(theme.warn)),
            Span::styled(row.title, Style::default().fg(theme.text)),
            Span::styled(format!(" {}", row.age), Style::default().fg(theme.muted)),
        ]));
    }
    Paragraph::new(lines).block(panel("Knowledge", theme))
}

fn render_sync(state: &ArenaState, theme: ArenaTheme, now: DateTime<Utc>) -> Paragraph<'static> {
    let Some(status) = state.sync_status.as_ref() else {
        return Paragraph::new(muted_line("no sync data", theme)).block(panel("Sync", theme));
    };
    let view = sync_panel(status, now);
    Paragraph::new(vec![
        Line::from(Span::styled(
            view.status.clone(),
            Style::default()
                .fg(if view.online { theme.ok } else { theme.critical })
                .add_modifier(Modifier::BOLD),
        )),
        muted_line(&format!("push {}", view.last_push), theme),
        muted_line(&format!("pull {}", view.last_pull), theme),
        Line::from(Span::styled(
            format!("queue {}", view.queue_depth),
            Style::default().fg(theme.level(view.queue_level)),
        )),
    ])
    .block(panel("Sync", theme))
}

fn render_brain(state: &ArenaState, theme: ArenaTheme, now: DateTime<Utc>) -> Paragraph<'static> {
    if !state.brain_available {
        return Paragraph::new(muted_line("brain offline", theme)).block(panel("Brain", theme));
    }
    let brain = &state.brain;
    let health = health_view(brain.health.as_ref(), brain.latency_ms);
    let mut lines = vec![Line::from(vec![
        Span::styled(
            if health.online { "\u{25cf} ONLINE" } else { "\u{25cb} DOWN" },
            Style::default()
                .fg(if health.online { theme.ok } else { theme.critical })
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                "  v{}  {}  db {}  up {}  {} records",
                health.version, health.latency, health.db_size, health.uptime, health.records
            ),
            Style::default().fg(theme.muted),
        ),
    ])];

    if let Some(team) = state.team_status.as_ref().filter(|team| team.active) {
        lines.push(Line::from(Span::styled(
            format!(
                "Team {}: {} teammates",
                team.team_name.as_deref().unwrap_or("--"),
                team.teammates.len()
            ),
            Style::default().fg(theme.info),
        )));
    }

    if !brain.projects().is_empty() {
        lines.push(section_line("Projects", theme));
        for project in brain.projects().iter().take(MAX_PROJECT_ROWS) {
            let card = project_card(project, now);
            let mut spans = vec![
                Span::styled(
                    if card.active { "\u{25cf} " } else { "\u{25cb} " },
                    Style::default().fg(if card.active { theme.ok } else { theme.muted }),
                ),
                Span::styled(card.name, Style::default().fg(theme.text)),
            ];
            if let Some(slug) = card.slug {
                spans.push(Span::styled(format!(" ({slug})"), Style::default().fg(theme.muted)));
            }
            if !card.tags.is_empty() {
                spans.push(Span::styled(
                    format!(" [{}]", card.tags.join(", ")),
                    Style::default().fg(theme.info),
                ));
            }
            if let Some(updated) = card.updated {
                spans.push(Span::styled(format!(" {updated}"), Style::default().fg(theme.muted)));
            }
            lines.push(Line::from(spans));
        }
    }

    let pills = brief_status_pills(brain.briefs());
    if !pills.is_empty() {
        lines.push(section_line("Briefs", theme));
        let mut spans = Vec::new();
        for (status, count) in pills {
            let color = theme.brief_status(&slug(&status));
            spans.push(Span::styled(format!("{status} {count}  "), Style::default().fg(color)));
        }
        lines.push(Line::from(spans));
    }

    let groups = session_groups(brain.sessions(), now);
    if !groups.is_empty() {
        lines.push(section_line("Sessions", theme));
        let mut shown = 0;
        'groups: for group in groups {
            lines.push(muted_line(group.label, theme));
            for entry in group.entries {
                if shown == MAX_SESSION_ROWS {
                    break 'groups;
                }
                shown += 1;
                let mut spans = vec![
                    Span::styled(format!("  {:<9}", entry.when), Style::default().fg(theme.muted)),
                    Span::styled(entry.project, Style::default().fg(theme.text)),
                ];
                if let Some(brief) = entry.brief {
                    spans.push(Span::styled(format!(" {brief}"), Style::default().fg(theme.info)));
                }
                if let Some(mode) = entry.mode {
                    spans.push(Span::styled(format!(" [{mode}]"), Style::default().fg(theme.warn)));
                }
                if let Some(summary) = entry.summary {
                    spans.push(Span::styled(
                        format!(" {}", ellipsize(&summary, 48)),
                        Style::default().fg(theme.muted),
                    ));
                }
                lines.push(Line::from(spans));
            }
        }
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel("Brain", theme))
}

fn section_line(title: &str, theme: ArenaTheme) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    ))
}

fn render_instances(
    frame: &mut Frame,
    app: &App,
    theme: ArenaTheme,
    now: DateTime<Utc>,
    area: Rect,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    frame.render_widget(render_vitals(&app.state, theme), rows[0]);

    let block = panel("Instances", theme);
    let inner_height = block.inner(rows[1]).height as usize;
    if !app.state.brain_available {
        frame.render_widget(
            Paragraph::new(muted_line("brain offline; no instance data", theme)).block(block),
            rows[1],
        );
        return;
    }
    let instances = app.state.brain.instances();
    if instances.is_empty() {
        frame.render_widget(
            Paragraph::new(muted_line("no instances reported", theme)).block(block),
            rows[1],
        );
        return;
    }

    let mut lines = Vec::new();
    let mut selected_line = 0;
    for (idx, inst) in instances.iter().enumerate() {
        let card = instance_card(inst, idx, now);
        let selected = idx == app.selected;
        if selected {
            selected_line = lines.len();
        }
        let expanded = app.expanded.as_deref() == Some(card.id.as_str());
        lines.push(instance_header(&card, selected, expanded, theme));
        if expanded {
            lines.extend(instance_detail(&card, theme));
        }
    }
    let scroll = selected_line.saturating_sub(inner_height.saturating_sub(2)) as u16;
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)).block(block), rows[1]);
}

fn vital_spans(label: &str, vital: Option<&Vital>, theme: ArenaTheme) -> Vec<Span<'static>> {
    let (text, color) = match vital {
        Some(vital) => (vital.text.clone(), theme.level(vital.level)),
        None => ("--".to_string(), theme.muted),
    };
    vec![
        Span::styled(format!("{label} "), Style::default().fg(theme.muted)),
        Span::styled(
            format!("{text}   "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ]
}

fn render_vitals(state: &ArenaState, theme: ArenaTheme) -> Paragraph<'static> {
    let vitals = compact_vitals(state);
    let mut spans = vital_spans("HP", vitals.hp.as_ref(), theme);
    spans.extend(vital_spans("CTX", vitals.ctx.as_ref(), theme));
    spans.extend(vital_spans("SYNC", vitals.sync.as_ref(), theme));
    let instances = state.brain.instances();
    let (active, idle) = instance_status_counts(instances);
    spans.push(Span::styled(
        format!("{active} active \u{b7} {idle} idle \u{b7} {} total", instances.len()),
        Style::default().fg(theme.text),
    ));
    Paragraph::new(Line::from(spans)).block(panel("Vitals", theme))
}

fn instance_header(
    card: &InstanceCard,
    selected: bool,
    expanded: bool,
    theme: ArenaTheme,
) -> Line<'static> {
    let cursor = if selected { "\u{25b6} " } else { "  " };
    let fold = if expanded { "\u{25be} " } else { "\u{25b8} " };
    let mut spans = vec![
        Span::styled(cursor, Style::default().fg(theme.accent)),
        Span::styled(fold, Style::default().fg(theme.muted)),
        Span::styled(
            if card.active { "\u{25cf} " } else { "\u{25cb} " },
            Style::default().fg(if card.active { theme.ok } else { theme.muted }),
        ),
        Span::styled(
            card.id.clone(),
            Style::default().fg(theme.text).add_modifier(if selected {
                Modifier::BOLD | Modifier::REVERSED
            } else {
                Modifier::BOLD
            }),
        ),
        Span::styled(format!("  {}", card.hostname), Style::default().fg(theme.muted)),
        Span::styled(format!("  {}", card.project), Style::default().fg(theme.info)),
        Span::styled(format!("  {}", card.brief), Style::default().fg(theme.text)),
        Span::styled(
            format!("  {}", card.phase),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", card.elapsed), Style::default().fg(theme.muted)),
    ];
    if card.team_lead {
        spans.push(Span::styled(
            format!("  [TEAM {}]", card.team_name),
            Style::default().fg(theme.warn),
        ));
    }
    Line::from(spans)
}

fn pipeline_spans(steps: &[(&'static str, PhaseStep)], theme: ArenaTheme) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for (pos, (name, step)) in steps.iter().enumerate() {
        if pos > 0 {
            spans.push(Span::styled(" \u{2500} ", Style::default().fg(theme.border)));
        }
        let style = Style::default().fg(theme.phase(*step));
        let style = if *step == PhaseStep::Active {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        };
        spans.push(Span::styled(name.to_string(), style));
    }
    spans
}

fn instance_detail(card: &InstanceCard, theme: ArenaTheme) -> Vec<Line<'static>> {
    if !card.team_lead {
        let mut spans = vec![Span::raw("      ")];
        spans.extend(pipeline_spans(&card.steps, theme));
        return vec![Line::from(spans)];
    }
    if card.teammates.is_empty() {
        return vec![muted_line("      no teammates reported", theme)];
    }
    card.teammates
        .iter()
        .map(|mate| {
            let mut spans = vec![
                Span::styled(
                    format!("      {:<14}", ellipsize(&mate.name, 14)),
                    Style::default().fg(theme.text),
                ),
                Span::styled(format!("{:<16}", ellipsize(&mate.brief, 16)), Style::default().fg(theme.info)),
                Span::styled(format!("{:<8}", mate.phase), Style::default().fg(theme.accent)),
                Span::styled(format!("{:<8}", mate.elapsed), Style::default().fg(theme.muted)),
            ];
            spans.extend(pipeline_spans(&mate.steps, theme));
            Line::from(spans)
        })
        .collect()
}

fn render_help_overlay(frame: &mut Frame, theme: ArenaTheme) {
    let area = centered_rect(64, 60, frame.size());
    let heading = |text: &str| {
        Line::from(Span::styled(
            text.to_string(),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let lines = vec![
        heading("Pages"),
        Line::from("  1 / 2    home / instances"),
        Line::from("  Tab      next page"),
        Line::from(""),
        heading("Range"),
        Line::from("  t w a    today / this week / all time"),
        Line::from(""),
        heading("Instances"),
        Line::from("  j k      move selection"),
        Line::from("  Enter    expand or collapse card"),
        Line::from("  Esc      collapse"),
        Line::from(""),
        heading("Session"),
        Line::from("  r        refetch everything"),
        Line::from("  ?        toggle help"),
        Line::from("  q        quit"),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel("Controls", theme)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}
