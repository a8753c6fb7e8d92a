use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveTime, Utc, Weekday};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;
use tally_core::calendar;

/// Parses a day such as `2025-03-14`, `today`, `next friday` or `3 days ago`
/// relative to "now" in `tz`.
pub fn parse_date(input: &str, tz: Tz) -> Result<NaiveDate> {
    let input = input.trim();
    if let Some(date) = calendar::parse_iso_date(input) {
        return Ok(date);
    }
    let now = Utc::now().with_timezone(&tz);
    let today = now.date_naive();
    match input.to_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return today.pred_opt().ok_or_else(|| anyhow!("Date out of range")),
        _ => {}
    }
    parse_date_string(input, now, Dialect::Uk)
        .map(|datetime| datetime.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parse time string like "9:00 AM", "14:30", "9pm", "noon", "midnight"
pub fn parse_time(time_str: &str) -> Result<NaiveTime> {
    let input = time_str.trim().to_lowercase().replace(' ', "");

    match input.as_str() {
        "noon" => return Ok(NaiveTime::MIN + chrono::Duration::hours(12)),
        "midnight" => return Ok(NaiveTime::MIN),
        _ => {}
    }

    const FORMATS: [&str; 3] = ["%H:%M", "%H:%M:%S", "%I:%M%p"];
    for format in FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&input, format) {
            return Ok(time);
        }
    }
    // Bare hours like "9pm": chrono needs the minutes
    if let Some(hour) = input.strip_suffix("am").or_else(|| input.strip_suffix("pm")) {
        let meridiem = &input[hour.len()..];
        if let Ok(time) = NaiveTime::parse_from_str(&format!("{hour}:00{meridiem}"), "%I:%M%p") {
            return Ok(time);
        }
    }

    Err(anyhow!(
        "Invalid time format: '{}'\n\nSupported formats:\n  • 24-hour: '14:30', '09:00'\n  • 12-hour: '2:30 PM', '9:00 AM'\n  • Compact: '2pm', '9am'\n  • Special: 'noon', 'midnight'",
        time_str
    ))
}

/// Parse days string like "mon,tue,wed", "monday,tuesday", or "weekdays"
pub fn parse_weekdays(days_str: &str) -> Result<Vec<Weekday>> {
    use Weekday::*;

    let input = days_str.trim().to_lowercase();
    match input.as_str() {
        "weekdays" | "workdays" => return Ok(vec![Mon, Tue, Wed, Thu, Fri]),
        "weekends" => return Ok(vec![Sat, Sun]),
        "daily" | "everyday" => return Ok(vec![Mon, Tue, Wed, Thu, Fri, Sat, Sun]),
        _ => {}
    }

    let mut weekdays = Vec::new();
    let mut invalid_days = Vec::new();
    for day in input.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match calendar::parse_weekday(day) {
            Some(weekday) if !weekdays.contains(&weekday) => weekdays.push(weekday),
            Some(_) => {}
            None => invalid_days.push(day.to_string()),
        }
    }

    if !invalid_days.is_empty() {
        return Err(anyhow!(
            "Invalid day(s): {}\n\nSupported formats:\n  • Full names: 'monday,tuesday,wednesday'\n  • Short names: 'mon,tue,wed'\n  • Groups: 'weekdays', 'weekends', 'daily'",
            invalid_days.join(", ")
        ));
    }
    if weekdays.is_empty() {
        return Err(anyhow!(
            "No valid days specified in: '{}'\n\nExamples:\n  • mon,wed,fri\n  • weekdays",
            days_str
        ));
    }
    Ok(weekdays)
}
