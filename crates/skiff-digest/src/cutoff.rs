//! Cutoff and duration parsing.
//!
//! A digest's cutoff spec is one of:
//! - a relative duration: `"1 day"`, `"2w"`, `"6 day 7.5 hours 8 min"`
//! - the literal `"forever"`, pinned to a fixed far-past date so every real
//!   entry passes the recency check
//! - an absolute date `YYYYMMDD` or an ISO datetime

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::DigestError;

/// Cutoff spec meaning "include everything".
pub const FOREVER: &str = "forever";

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        ((?P<weeks>[.\d]+)w(eeks?)?)?
        ((?P<days>[.\d]+)d(ays?)?)?
        ((?P<hours>[.\d]+)h(ours?)?)?
        ((?P<minutes>[.\d]+)m(in(utes?)?)?)?
        ((?P<seconds>[.\d]+)s(ec(onds?)?)?)?
        $
        ",
    )
    .expect("duration regex compiles")
});

/// Parse a duration string like `"2h13m"` or `"6 day 7.5 hours"`.
///
/// Spaces are ignored; fractional values are allowed. Returns `None` for
/// anything that does not parse cleanly, including the empty string and bare
/// numbers with no unit.
#[must_use]
pub fn parse_duration(spec: &str) -> Option<Duration> {
    let squeezed = spec.replace(' ', "");
    if squeezed.is_empty() {
        return None;
    }
    let caps = DURATION_RE.captures(&squeezed)?;
    let part = |name: &str, unit_secs: f64| {
        caps.name(name)
            .map_or(Some(0.0), |m| m.as_str().parse::<f64>().ok())
            .map(|v| v * unit_secs)
    };
    let total = part("weeks", 604_800.0)?
        + part("days", 86_400.0)?
        + part("hours", 3_600.0)?
        + part("minutes", 60.0)?
        + part("seconds", 1.0)?;
    if total == 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(Duration::milliseconds((total * 1000.0) as i64))
}

/// Resolve a cutoff spec to a concrete timestamp, relative to `now`.
///
/// # Errors
///
/// [`DigestError::BadCutoff`] when the spec is not a recognized form.
pub fn parse_cutoff(spec: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DigestError> {
    if spec == FOREVER {
        return Ok(forever_cutoff());
    }
    if spec.len() == 8 && spec.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(spec, "%Y%m%d") {
            return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()));
        }
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(spec, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&datetime));
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(spec) {
        return Ok(datetime.with_timezone(&Utc));
    }
    parse_duration(spec)
        .map(|duration| now - duration)
        .ok_or_else(|| DigestError::BadCutoff(spec.to_owned()))
}

/// The fixed far-past date `"forever"` maps to.
#[must_use]
pub fn forever_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).single().unwrap_or_default()
}
