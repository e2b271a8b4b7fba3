//! Duration grammar parsing and formatting
//!
//! Rule schedules appear in two historical wire forms: machine duration
//! strings (`PT1H`, `P1DT6H`) and clock-time spans (`1:00:00`, optionally
//! with a day prefix as `2.03:00:00`). Stored records use the machine
//! grammar exclusively; both forms resolve to [`std::time::Duration`] so
//! comparisons are by value, never by string shape.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Clock-time span: optional day prefix, then H:MM:SS.
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)\.)?(\d{1,2}):(\d{2}):(\d{2})$").expect("clock-time pattern")
});

/// Parse a clock-time span (`H:MM:SS` or `D.HH:MM:SS`).
///
/// Returns `None` if the input does not match the clock pattern or the
/// minute/second fields are out of range.
pub fn parse_clock_time(input: &str) -> Option<Duration> {
    let caps = CLOCK_TIME.captures(input.trim())?;

    let days: u64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    let hours: u64 = caps[2].parse().ok()?;
    let minutes: u64 = caps[3].parse().ok()?;
    let seconds: u64 = caps[4].parse().ok()?;

    if minutes > 59 || seconds > 59 {
        return None;
    }

    Some(Duration::from_secs(
        days * 86_400 + hours * 3_600 + minutes * 60 + seconds,
    ))
}

/// Parse a machine duration string (`PnDTnHnMnS` grammar).
///
/// Accepts the day/hour/minute/second designators in order; at least one
/// component must be present. Returns `None` on any other shape.
pub fn parse_machine(input: &str) -> Option<Duration> {
    let s = input.trim();
    let rest = s.strip_prefix('P')?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total: u64 = 0;
    let mut seen = false;

    if !date_part.is_empty() {
        let days = date_part.strip_suffix('D')?.parse::<u64>().ok()?;
        total += days * 86_400;
        seen = true;
    }

    if let Some(time) = time_part {
        if time.is_empty() {
            return None;
        }
        let mut cursor = time;
        for (designator, unit_secs) in [('H', 3_600u64), ('M', 60), ('S', 1)] {
            if let Some(idx) = cursor.find(designator) {
                let value = cursor[..idx].parse::<u64>().ok()?;
                total += value * unit_secs;
                cursor = &cursor[idx + 1..];
                seen = true;
            }
        }
        if !cursor.is_empty() {
            return None;
        }
    }

    if seen { Some(Duration::from_secs(total)) } else { None }
}

/// Format a duration in the canonical machine grammar.
///
/// Whole days are emitted as a `D` component; the remainder as `H`/`M`/`S`.
/// Zero formats as `PT0S`.
pub fn format_machine(duration: Duration) -> String {
    let mut secs = duration.as_secs();

    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3_600;
    secs %= 3_600;
    let minutes = secs / 60;
    secs %= 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || secs > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

/// Serde adapter storing durations in the machine grammar.
pub mod machine_format {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_machine(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_machine(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid duration string '{raw}'")))
    }
}
