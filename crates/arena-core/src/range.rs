use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time window applied to snapshot queries and incoming events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    Today,
    Week,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Today => "today",
            TimeRange::Week => "week",
            TimeRange::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Today => "Today",
            TimeRange::Week => "This Week",
            TimeRange::All => "All Time",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            TimeRange::Today => TimeRange::Week,
            TimeRange::Week => TimeRange::All,
            TimeRange::All => TimeRange::Today,
        }
    }

    /// Unknown strings fall back to `Today`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    /// Compares the date prefix of `ts` against the window. Events without a
    /// timestamp always match.
    pub fn matches(&self, ts: Option<&str>, now: DateTime<Utc>) -> bool {
        if *self == TimeRange::All {
            return true;
        }
        let Some(event_date) = ts.and_then(date_prefix) else {
            return true;
        };
        match self {
            TimeRange::Today => event_date == now.format("%Y-%m-%d").to_string(),
            TimeRange::Week => {
                let from_monday = i64::from(now.weekday().num_days_from_monday());
                let monday = (now - Duration::days(from_monday))
                    .format("%Y-%m-%d")
                    .to_string();
                event_date >= monday.as_str()
            }
            TimeRange::All => true,
        }
    }
}

fn date_prefix(ts: &str) -> Option<&str> {
    let trimmed = ts.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.get(..10).unwrap_or(trimmed))
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown range '{0}' (expected today, week or all)")]
pub struct UnknownRange(pub String);

impl FromStr for TimeRange {
    type Err = UnknownRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "all" => Ok(TimeRange::All),
            other => Err(UnknownRange(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn today_matches_same_utc_date_only() {
        let now = wednesday();
        assert!(TimeRange::Today.matches(Some("2026-02-18T01:02:03Z"), now));
        assert!(!TimeRange::Today.matches(Some("2026-02-17T23:59:59Z"), now));
    }

    #[test]
    fn week_starts_on_monday() {
        let now = wednesday();
        assert!(TimeRange::Week.matches(Some("2026-02-16T00:00:00Z"), now));
        assert!(TimeRange::Week.matches(Some("2026-02-18 08:00:00"), now));
        assert!(!TimeRange::Week.matches(Some("2026-02-15T23:59:59Z"), now));
    }

    #[test]
    fn week_on_sunday_reaches_back_six_days() {
        let sunday = Utc.with_ymd_and_hms(2026, 2, 22, 9, 0, 0).unwrap();
        assert!(TimeRange::Week.matches(Some("2026-02-16T00:00:00Z"), sunday));
        assert!(!TimeRange::Week.matches(Some("2026-02-15T12:00:00Z"), sunday));
    }

    #[test]
    fn missing_timestamp_always_matches() {
        let now = wednesday();
        assert!(TimeRange::Today.matches(None, now));
        assert!(TimeRange::Week.matches(Some("  "), now));
        assert!(TimeRange::All.matches(Some("1999-01-01"), now));
    }

    #[test]
    fn parse_is_case_insensitive_and_lenient() {
        assert_eq!("WEEK".parse::<TimeRange>(), Ok(TimeRange::Week));
        assert!("month".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::parse_lenient("month"), TimeRange::Today);
        assert_eq!(TimeRange::All.next(), TimeRange::Today);
    }
}
