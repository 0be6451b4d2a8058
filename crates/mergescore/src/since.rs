//! Parsing of the `--since` time bound
//!
//! Accepts RFC 3339 timestamps, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and
//! relative phrases such as `2 weeks ago` or `1 month`.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};

use crate::config::ConfigError;

/// Resolve `text` to an absolute UTC instant, relative phrases counted back from `now`
///
/// # Errors
///
/// Returns `ConfigError::InvalidSince` when no accepted form matches.
pub fn parse_since(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
    let trimmed = text.trim();
    let invalid = || ConfigError::InvalidSince(text.to_string());

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|ts| ts.and_utc())
            .ok_or_else(invalid);
    }

    parse_relative(trimmed, now).ok_or_else(invalid)
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lowered = text.to_ascii_lowercase();
    let mut words = lowered.split_whitespace();

    let amount: u32 = words.next()?.parse().ok()?;
    let unit = words.next()?;
    match words.next() {
        None | Some("ago") => {}
        Some(_) => return None,
    }
    if words.next().is_some() {
        return None;
    }

    let unit = unit.strip_suffix('s').unwrap_or(unit);
    let amount_i64 = i64::from(amount);
    match unit {
        "minute" => now.checked_sub_signed(Duration::minutes(amount_i64)),
        "hour" => now.checked_sub_signed(Duration::hours(amount_i64)),
        "day" => now.checked_sub_signed(Duration::days(amount_i64)),
        "week" => now.checked_sub_signed(Duration::weeks(amount_i64)),
        "month" => now.checked_sub_months(Months::new(amount)),
        "year" => now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}
