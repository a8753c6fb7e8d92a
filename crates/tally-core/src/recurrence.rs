use chrono::{Datelike, Duration, NaiveDate};

use crate::calendar;
use crate::models::{CompletionResult, Recurrence, RoutineTask, Task, TaskKind, TimeUnit};

/// Upper bound for forward scans when no end date limits the series.
pub const MAX_SCAN_DAYS: i64 = 366;

/// Decides whether `task` has an occurrence on `date`.
///
/// # Arguments
/// * `task` - Task definition as loaded from storage
/// * `date` - Calendar day being rendered or checked
///
/// # Behavior
/// - One-time tasks match only their own date
/// - Routines never match outside `[start_date, end_date]`
/// - An excluded date never matches, whatever the cadence says
/// - Otherwise the cadence rule decides (see [`matches_cadence`])
///
/// Pure and total: malformed cadences simply never match.
pub fn is_task_scheduled_for_date(task: &Task, date: NaiveDate) -> bool {
    match &task.kind {
        TaskKind::OneTime(one_time) => one_time.date == date,
        TaskKind::Routine(routine) => is_routine_scheduled_for_date(routine, date),
    }
}

pub fn is_routine_scheduled_for_date(routine: &RoutineTask, date: NaiveDate) -> bool {
    if routine.start_date.is_some_and(|start| date < start) {
        return false;
    }
    if routine.end_date.is_some_and(|end| date > end) {
        return false;
    }
    if routine.excluded_dates.contains(&date) {
        return false;
    }
    matches_cadence(routine, date)
}

/// Cadence rule alone, ignoring range and exclusions.
///
/// Weekdays win over month day, which wins over the generic interval. A
/// routine with none of them set never matches.
pub fn matches_cadence(routine: &RoutineTask, date: NaiveDate) -> bool {
    if !routine.weekdays.is_empty() {
        return routine.weekdays.contains(&date.weekday());
    }
    if let Some(month_day) = routine.month_day {
        // A 31 never lands in a 30-day month: that month is skipped.
        return date.day() == month_day;
    }
    match (routine.recurrence, routine.start_date) {
        (Some(recurrence), Some(start)) => matches_interval(recurrence, start, date),
        _ => false,
    }
}

/// True when a whole number of `recurrence` steps separates `start` and `date`.
fn matches_interval(recurrence: Recurrence, start: NaiveDate, date: NaiveDate) -> bool {
    if recurrence.interval == 0 || date < start {
        return false;
    }
    let interval = recurrence.interval as i64;
    match recurrence.unit {
        TimeUnit::Days => calendar::days_between(start, date) % interval == 0,
        TimeUnit::Weeks => {
            let days = calendar::days_between(start, date);
            days % 7 == 0 && (days / 7) % interval == 0
        }
        TimeUnit::Months => {
            date.day() == start.day() && calendar::months_between(start, date) % interval == 0
        }
    }
}

/// Whether the occurrence on `date` counts as done.
///
/// One-time tasks carry a single flag regardless of the date asked about.
pub fn is_task_completed_for_date(task: &Task, date: NaiveDate) -> bool {
    match &task.kind {
        TaskKind::OneTime(one_time) => one_time.is_completed,
        TaskKind::Routine(routine) => routine.completed_dates.contains(&date),
    }
}

/// Flips completion for `date` in memory. Applying it twice restores the
/// original state.
pub fn toggle_completion(task: &mut Task, date: NaiveDate) -> CompletionResult {
    match &mut task.kind {
        TaskKind::OneTime(one_time) => {
            one_time.is_completed = !one_time.is_completed;
            if one_time.is_completed {
                CompletionResult::Completed
            } else {
                CompletionResult::Reopened
            }
        }
        TaskKind::Routine(routine) => {
            if routine.completed_dates.remove(&date) {
                CompletionResult::Reopened
            } else {
                routine.completed_dates.insert(date);
                CompletionResult::Completed
            }
        }
    }
}

/// Finds the first scheduled day at or after `from`.
///
/// # Arguments
/// * `task` - Task to resolve
/// * `from` - First day considered
/// * `horizon_days` - Scan limit, clamped to [`MAX_SCAN_DAYS`]
///
/// # Returns
/// * `Option<NaiveDate>` - Next occurrence, or `None` if the series ended or
///   nothing matches inside the horizon
pub fn next_occurrence(task: &Task, from: NaiveDate, horizon_days: i64) -> Option<NaiveDate> {
    let horizon = horizon_days.clamp(0, MAX_SCAN_DAYS);
    let mut last = from + Duration::days(horizon);
    if let TaskKind::Routine(routine) = &task.kind {
        if let Some(end) = routine.end_date {
            last = last.min(end);
        }
    }
    from.iter_days()
        .take_while(|day| *day <= last)
        .find(|day| is_task_scheduled_for_date(task, *day))
}

/// Lists up to `count` upcoming occurrences starting at `from`.
pub fn upcoming_occurrences(task: &Task, from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut result = Vec::with_capacity(count.min(16));
    let mut cursor = from;
    while result.len() < count {
        let remaining = MAX_SCAN_DAYS - calendar::days_between(from, cursor);
        if remaining < 0 {
            break;
        }
        match next_occurrence(task, cursor, remaining) {
            Some(day) => {
                result.push(day);
                cursor = day + Duration::days(1);
            }
            None => break,
        }
    }
    result
}

/// Tasks with an occurrence on `date`, uncompleted ones first.
pub fn tasks_for_date(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    let mut scheduled: Vec<&Task> = tasks
        .iter()
        .filter(|task| is_task_scheduled_for_date(task, date))
        .collect();
    scheduled.sort_by_key(|task| is_task_completed_for_date(task, date));
    scheduled
}

/// Rounded share of the day's tasks that are done, 0 when nothing is due.
pub fn completion_percentage(tasks: &[Task], date: NaiveDate) -> u32 {
    let scheduled = tasks_for_date(tasks, date);
    if scheduled.is_empty() {
        return 0;
    }
    let done = scheduled
        .iter()
        .filter(|task| is_task_completed_for_date(task, date))
        .count();
    ((done as f64 / scheduled.len() as f64) * 100.0).round() as u32
}
