use chrono::{Datelike, NaiveDate};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use tally_core::calendar;
use tally_core::models::{Counter, CounterEntry, Notification, Task, TaskKind};
use tally_core::recurrence;
use tally_core::reset::ResetSummary;
use tally_core::service::{DaySummary, DayView};
use tally_core::timezone;

use crate::util::short_id;

/// Human description of when a task happens.
pub fn describe_schedule(task: &Task) -> String {
    match &task.kind {
        TaskKind::OneTime(one_time) => calendar::format_iso_date(one_time.date),
        TaskKind::Routine(routine) => {
            let cadence = if !routine.weekdays.is_empty() {
                let mut days: Vec<_> = routine.weekdays.iter().copied().collect();
                days.sort_by_key(|day| day.num_days_from_monday());
                days.iter()
                    .map(|day| &calendar::weekday_name(*day)[..3])
                    .collect::<Vec<_>>()
                    .join(", ")
            } else if let Some(day) = routine.month_day {
                format!("day {day} of the month")
            } else if let Some(recurrence) = routine.recurrence {
                format!("every {} {}", recurrence.interval, recurrence.unit)
            } else {
                "never".to_string()
            };
            match routine.end_date {
                Some(end) => format!("{cadence} until {}", calendar::format_iso_date(end)),
                None => cadence,
            }
        }
    }
}

pub fn display_tasks(tasks: &[Task], today: NaiveDate) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Schedule", "Time", "Next", "Reminder"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&task.id)));

        let mut title = String::new();
        if task.is_routine() {
            title.push('↻');
            title.push(' ');
        }
        title.push_str(&task.title);
        let mut title_cell = Cell::new(title);
        if let TaskKind::OneTime(one_time) = &task.kind {
            if one_time.is_completed {
                title_cell = title_cell
                    .add_attribute(Attribute::CrossedOut)
                    .fg(Color::DarkGrey);
            }
        }
        row.add_cell(title_cell);
        row.add_cell(Cell::new(describe_schedule(task)));
        row.add_cell(Cell::new(
            task.time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));

        let next_cell = match recurrence::next_occurrence(task, today, recurrence::MAX_SCAN_DAYS) {
            Some(date) if date == today => Cell::new("today").fg(Color::Yellow),
            Some(date) => Cell::new(calendar::format_iso_date(date)),
            None => Cell::new("None").fg(Color::DarkGrey),
        };
        row.add_cell(next_cell);

        let prefs = &task.notifications;
        row.add_cell(Cell::new(if prefs.notify_before {
            match prefs.notify_in_advance.filter(|n| *n > 0) {
                Some(n) => format!("{n} {} before", prefs.time_unit),
                None => "default".to_string(),
            }
        } else {
            "off".to_string()
        }));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_counters(counters: &[Counter]) {
    if counters.is_empty() {
        println!("No counters found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Kind", "Value", "Goal", "Since", "Active"]);

    for counter in counters {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&counter.id)));
        row.add_cell(Cell::new(&counter.name));
        row.add_cell(Cell::new(counter.kind.to_string()));

        let mut value_cell = Cell::new(counter.current_value);
        if counter.goal_reached() {
            value_cell = value_cell.fg(Color::Green).add_attribute(Attribute::Bold);
        }
        row.add_cell(value_cell);
        row.add_cell(Cell::new(
            counter.goal.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
        row.add_cell(Cell::new(
            counter
                .last_reset_date
                .map(calendar::format_iso_date)
                .unwrap_or_else(|| "-".to_string()),
        ));
        let range = match (counter.start_date, counter.end_date) {
            (Some(start), Some(end)) => format!(
                "{} → {}",
                calendar::format_iso_date(start),
                calendar::format_iso_date(end)
            ),
            (Some(start), None) => format!("from {}", calendar::format_iso_date(start)),
            (None, _) => "never".to_string(),
        };
        row.add_cell(Cell::new(range));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_entries(entries: &[CounterEntry]) {
    if entries.is_empty() {
        println!("No history yet.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Counter", "Value", "Source", "Note"]);
    for entry in entries {
        let mut row = Row::new();
        row.add_cell(Cell::new(calendar::format_iso_date(entry.date)));
        row.add_cell(Cell::new(&entry.name));
        row.add_cell(Cell::new(entry.value));
        let source = Cell::new(entry.source.to_string());
        row.add_cell(if entry.source.is_manual() {
            source.fg(Color::Cyan)
        } else {
            source
        });
        row.add_cell(Cell::new(entry.note.as_deref().unwrap_or("")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_notifications(notifications: &[Notification], tz: Tz) {
    if notifications.is_empty() {
        println!("No notifications.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "When", "At", "Kind", "Title", "Message"]);
    for notification in notifications {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&notification.id)));
        row.add_cell(Cell::new(notification.timestamp.humanize()));
        row.add_cell(Cell::new(timezone::format_with_timezone(
            notification.timestamp,
            tz,
            "%Y-%m-%d %H:%M",
        )));
        row.add_cell(Cell::new(notification.kind.to_string()));
        let mut title = Cell::new(&notification.title);
        if !notification.read {
            title = title.add_attribute(Attribute::Bold);
        }
        row.add_cell(title);
        row.add_cell(Cell::new(&notification.message));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_day(view: &DayView, today: NaiveDate) {
    let heading = if view.date == today {
        "Today".to_string()
    } else {
        calendar::weekday_name(view.date.weekday()).to_string()
    };
    println!("{} {}", heading, calendar::format_iso_date(view.date));

    if view.tasks.is_empty() {
        println!("No tasks scheduled.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["", "ID", "Task", "Time"]);
        for (task, done) in &view.tasks {
            let mut row = Row::new();
            row.add_cell(if *done {
                Cell::new("✓").fg(Color::Green)
            } else {
                Cell::new("·")
            });
            row.add_cell(Cell::new(short_id(&task.id)));
            let title = Cell::new(&task.title);
            row.add_cell(if *done {
                title.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey)
            } else {
                title
            });
            row.add_cell(Cell::new(
                task.time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
            ));
            table.add_row(row);
        }
        println!("{table}");
        println!("Completed: {}%", view.completion_percentage);
    }

    if !view.counters.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Counter", "Value", "Goal"]);
        for (counter, value) in &view.counters {
            let mut row = Row::new();
            row.add_cell(Cell::new(short_id(&counter.id)));
            row.add_cell(Cell::new(&counter.name));
            row.add_cell(Cell::new(value));
            row.add_cell(Cell::new(
                counter.goal.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string()),
            ));
            table.add_row(row);
        }
        println!("{table}");
    }
}

/// Month grid, Monday first. A day shows `done/scheduled` tasks and a `+`
/// when counters are active.
pub fn display_month(days: &[DaySummary], month: NaiveDate, today: NaiveDate) {
    println!("{}", month.format("%B %Y"));

    let mut table = Table::new();
    table.set_header(vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
    for week in days.chunks(7) {
        let mut row = Row::new();
        for day in week {
            let mut text = day.date.day().to_string();
            if day.scheduled_tasks > 0 {
                text.push_str(&format!(" {}/{}", day.completed_tasks, day.scheduled_tasks));
            }
            if day.active_counters > 0 {
                text.push_str(" +");
            }
            let mut cell = Cell::new(text);
            if !day.in_month {
                cell = cell.fg(Color::DarkGrey);
            } else if day.date == today {
                cell = cell.add_attribute(Attribute::Bold).fg(Color::Yellow);
            } else if day.scheduled_tasks > 0 && day.completed_tasks == day.scheduled_tasks {
                cell = cell.fg(Color::Green);
            }
            row.add_cell(cell);
        }
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_reset_summary(summary: &ResetSummary) {
    println!(
        "Checked {} counter(s): {} reset, {} initialized, {} already reset ({} ms)",
        summary.counters_checked,
        summary.counters_reset,
        summary.counters_initialized,
        summary.already_reset,
        summary.duration_ms
    );
    for error in &summary.errors {
        println!("  ! {error}");
    }
}
