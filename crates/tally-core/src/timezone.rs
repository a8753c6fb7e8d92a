use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone)
        .map_err(|_| CoreError::InvalidTimezone(format!("Invalid timezone: {}", timezone)))
}

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

/// Calendar day of `now` as seen in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Wall-clock time of `now` in `tz`.
pub fn local_now(tz: Tz, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&tz).naive_local()
}

/// Resolve a local wall-clock time to an instant.
///
/// Ambiguous times (fall back) resolve to the earlier instant. Times that do
/// not exist (spring forward) move one hour later, which lands past the gap
/// for every zone with hourly transitions.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                // Both ends inside a gap: read the wall clock as UTC
                None => Utc.from_utc_datetime(&local),
            }
        }
    }
}

/// First instant of the day after `now` in `tz`.
pub fn next_midnight(tz: Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = today_in(tz, now) + Duration::days(1);
    resolve_local(tz, tomorrow.and_time(NaiveTime::MIN))
}

/// Time left until the next local midnight, never negative.
pub fn until_next_midnight(tz: Tz, now: DateTime<Utc>) -> std::time::Duration {
    (next_midnight(tz, now) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Format datetime with timezone-aware display
pub fn format_with_timezone(datetime: DateTime<Utc>, tz: Tz, format: &str) -> String {
    datetime.with_timezone(&tz).format(format).to_string()
}
