//! Display helpers shared by every panel. Anything time-relative takes an
//! explicit `now` so output stays deterministic under test.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    let normalized = trimmed.replacen(' ', "T", 1);
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive timestamps are UTC on the wire.
    let naive = normalized.trim_end_matches('Z');
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, pattern) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }
    None
}

pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_tokens(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}K", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

fn elapsed_since(raw: Option<&str>, now: DateTime<Utc>) -> Option<Duration> {
    let at = parse_timestamp(raw?)?;
    Some(now.signed_duration_since(at))
}

/// Short relative age: `42s ago`, `3m ago`, `5h ago`, `2d ago`.
pub fn time_ago(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(diff) = elapsed_since(raw, now) else {
        return "--".to_string();
    };
    if diff < Duration::zero() {
        return "just now".to_string();
    }
    let seconds = diff.num_seconds();
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

/// Like [`time_ago`] but rolls days over into weeks.
pub fn relative_time(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(diff) = elapsed_since(raw, now) else {
        return "--".to_string();
    };
    if diff < Duration::zero() {
        return "just now".to_string();
    }
    let days = diff.num_days();
    if days < 7 {
        return time_ago(raw, now);
    }
    format!("{}w ago", days / 7)
}

pub fn format_clock(raw: Option<&str>) -> String {
    format_clock_in(raw, &Local)
}

pub fn format_clock_in<Tz: TimeZone>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match raw.and_then(parse_timestamp) {
        Some(at) => at.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }
    if seconds < 60.0 {
        return format!("{}s", seconds.round() as u64);
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).round() as u64;
    format!("{minutes}m {rest}s")
}

/// Percentage of `part` in `total`, clamped to 0..=100.
pub fn pct(part: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    (part / total * 100.0).clamp(0.0, 100.0)
}

pub fn format_rate(cost_per_token: f64) -> String {
    if cost_per_token == 0.0 {
        return "$0.00/M".to_string();
    }
    format!("${:.2}/M", cost_per_token * 1_000_000.0)
}

pub fn format_cost(dollars: f64) -> String {
    if dollars == 0.0 {
        return "$0.00".to_string();
    }
    if dollars < 0.01 {
        return "<$0.01".to_string();
    }
    format!("${dollars:.2}")
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        0 => "0 B".to_string(),
        b if b < KB => format!("{b} B"),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

pub fn format_uptime(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn date_group(raw: Option<&str>, now: DateTime<Utc>) -> &'static str {
    let Some(at) = raw.and_then(parse_timestamp) else {
        return "Unknown";
    };
    let day = at.date_naive();
    let today = now.date_naive();
    if day == today {
        "Today"
    } else if Some(day) == today.pred_opt() {
        "Yesterday"
    } else {
        "Earlier"
    }
}

/// Lower-case slug used for status and category badges.
pub fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('-');
        }
    }
    out
}

pub fn ellipsize(input: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let count = input.chars().count();
    if count <= max {
        return input.to_string();
    }
    if max <= 3 {
        return input.chars().take(max).collect();
    }
    let mut out: String = input.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
