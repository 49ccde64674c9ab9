// src/timing.rs
// Render-to-submit timing classification.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingIssue {
    TooFast,
    TooSlow,
    Valid,
    /// No render token, or the token failed verification.
    Unknown,
}

impl TimingIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            TimingIssue::TooFast => "too_fast",
            TimingIssue::TooSlow => "too_slow",
            TimingIssue::Valid => "valid",
            TimingIssue::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingThresholds {
    pub too_fast: f64,
    pub too_slow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingVerdict {
    pub issue: TimingIssue,
    pub elapsed_seconds: Option<f64>,
}

impl TimingVerdict {
    pub fn unknown() -> Self {
        Self {
            issue: TimingIssue::Unknown,
            elapsed_seconds: None,
        }
    }

    fn fail_open() -> Self {
        Self {
            issue: TimingIssue::Valid,
            elapsed_seconds: Some(0.0),
        }
    }
}

/// Strict on both ends: an elapsed time equal to a threshold is valid.
pub fn classify_elapsed(elapsed: f64, thresholds: TimingThresholds) -> TimingIssue {
    if elapsed < thresholds.too_fast {
        TimingIssue::TooFast
    } else if elapsed > thresholds.too_slow {
        TimingIssue::TooSlow
    } else {
        TimingIssue::Valid
    }
}

/// Parses an ISO-8601 render time. Offset-less values are placed in `tz`.
pub fn parse_render_time(raw: &str, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed);
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(trimmed, format)
            .ok()
            .and_then(|naive| tz.from_local_datetime(&naive).single())
    })
}

/// Classifies the time between render and `now`.
///
/// A missing or unparsable render time is not an error: the verdict falls back to
/// `Valid` with zero elapsed time and a warning is logged.
pub fn classify(
    render_time: Option<&str>,
    now: DateTime<Utc>,
    thresholds: TimingThresholds,
    tz: FixedOffset,
) -> TimingVerdict {
    let Some(raw) = render_time.filter(|raw| !raw.trim().is_empty()) else {
        return TimingVerdict::fail_open();
    };
    let Some(rendered_at) = parse_render_time(raw, tz) else {
        log::warn!(target: "honeyguard", "Error parsing render time: {:?}", raw);
        return TimingVerdict::fail_open();
    };
    let elapsed = now.signed_duration_since(rendered_at.with_timezone(&Utc));
    let elapsed_seconds = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0;
    TimingVerdict {
        issue: classify_elapsed(elapsed_seconds, thresholds),
        elapsed_seconds: Some(elapsed_seconds),
    }
}
