use chrono::{Datelike, NaiveDate};

use crate::calendar;
use crate::models::{Counter, CounterKind};

/// Whether `counter` shows up on `date`.
///
/// Inactive without a start date or outside `[start_date, end_date]`. Daily
/// and cumulative counters are active on every day of the range; weekly ones
/// on the start date's weekday; monthly ones on the start date's day of month.
pub fn is_counter_active_for_date(counter: &Counter, date: NaiveDate) -> bool {
    let Some(start) = counter.start_date else {
        return false;
    };
    if !calendar::is_within(date, start, counter.end_date) {
        return false;
    }
    match counter.kind {
        CounterKind::Daily | CounterKind::Cumulative => true,
        CounterKind::Weekly => date.weekday() == start.weekday(),
        CounterKind::Monthly => date.day() == start.day(),
    }
}

/// Value shown for `date`: live on `today`, zero on any other day.
pub fn display_value(counter: &Counter, date: NaiveDate, today: NaiveDate) -> u32 {
    if date == today {
        counter.current_value
    } else {
        0
    }
}

pub fn counters_for_date(counters: &[Counter], date: NaiveDate) -> Vec<&Counter> {
    counters
        .iter()
        .filter(|counter| is_counter_active_for_date(counter, date))
        .collect()
}
