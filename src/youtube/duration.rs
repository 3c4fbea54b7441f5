//! Decoding of YouTube `contentDetails.duration` codes.
//!
//! The Data API reports durations as ISO 8601 periods such as `PT3M45S`.
//! Replies show them as minutes and seconds; hours and days are folded into
//! the minute count so long videos are never under-reported.

use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
        .expect("Invalid duration regex")
});

/// Parse a duration code into total seconds.
///
/// Returns `None` when the code is not a day/hour/minute/second period or
/// does not fit in a `u64` second count.
pub fn parse_duration_seconds(code: &str) -> Option<u64> {
    let caps = DURATION_RE.captures(code.trim())?;

    let part = |idx: usize| -> Option<u64> {
        match caps.get(idx) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    let days = part(1)?;
    let hours = part(2)?;
    let minutes = part(3)?;
    let seconds = part(4)?;

    days.checked_mul(24)?
        .checked_add(hours)?
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)
}

/// Format a duration code as `"<minutes> min <seconds> sec"`.
///
/// Missing components count as zero. Unparseable codes give `"unknown"`.
pub fn format_duration(code: &str) -> String {
    match parse_duration_seconds(code) {
        Some(total) => format!("{} min {} sec", total / 60, total % 60),
        None => "unknown".to_string(),
    }
}
