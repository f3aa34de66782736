use arena_core::brain::PhaseStep;
use arena_core::views::{AgentStatus, GaugeLevel};
use arena_core::{AgentProfile, LogKind};
use ratatui::style::Color;

#[derive(Clone, Copy, Debug)]
pub struct ArenaTheme {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub info: Color,
}

pub fn crimson_theme() -> ArenaTheme {
    ArenaTheme {
        bg: Color::Rgb(14, 8, 10),
        surface: Color::Rgb(28, 14, 18),
        border: Color::Rgb(110, 34, 44),
        title: Color::Rgb(254, 202, 202),
        text: Color::Rgb(231, 229, 228),
        muted: Color::Rgb(150, 135, 138),
        accent: Color::Rgb(220, 38, 38),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(248, 50, 50),
        info: Color::Rgb(96, 165, 250),
    }
}

impl ArenaTheme {
    pub fn level(&self, level: GaugeLevel) -> Color {
        match level {
            GaugeLevel::Ok => self.ok,
            GaugeLevel::Transition => self.info,
            GaugeLevel::Warning => self.warn,
            GaugeLevel::Critical => self.critical,
        }
    }

    pub fn log_kind(&self, kind: LogKind) -> Color {
        match kind {
            LogKind::Start => self.info,
            LogKind::Stop => self.ok,
            LogKind::Skill => self.warn,
            LogKind::Other => self.muted,
        }
    }

    pub fn agent_status(&self, status: AgentStatus) -> Color {
        match status {
            AgentStatus::Active => self.ok,
            AgentStatus::HasData => self.text,
            AgentStatus::Idle => self.muted,
        }
    }

    pub fn phase(&self, step: PhaseStep) -> Color {
        match step {
            PhaseStep::Done => self.ok,
            PhaseStep::Active => self.accent,
            PhaseStep::Pending => self.muted,
        }
    }

    /// Badge colour for brief statuses, keyed by slug.
    pub fn brief_status(&self, slug: &str) -> Color {
        match slug {
            "ready" => self.info,
            "in-progress" => self.warn,
            "done" => self.ok,
            "blocked" => self.critical,
            _ => self.muted,
        }
    }
}

pub fn agent_color(profile: &AgentProfile) -> Color {
    let (r, g, b) = profile.color;
    Color::Rgb(r, g, b)
}
