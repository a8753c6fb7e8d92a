use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};
use tally_core::calendar;
use tally_core::error::CoreError;
use tally_core::models::{
    CompletionResult, NewRoutineData, NewTaskData, NewTaskKind, NotificationPrefs, RecurrenceType,
};
use tally_core::recurrence;
use tally_core::repository::Repository;
use tally_core::service::Tracker;

use crate::cli::{AddTaskCommand, DeleteCommand, TaskCommand, TaskDateCommand, UpcomingCommand};
use crate::commands::confirm;
use crate::parser::{parse_date, parse_time, parse_weekdays};
use crate::util::{resolve_task_id, short_id};
use crate::views::table::{describe_schedule, display_tasks};

pub async fn task_command<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: TaskCommand,
) -> Result<()> {
    match command {
        TaskCommand::Add(command) => add_task(tracker, command).await,
        TaskCommand::List => {
            let tasks = tracker.tasks().await?;
            display_tasks(&tasks, tracker.today());
            Ok(())
        }
        TaskCommand::Done(command) => toggle_task(tracker, command).await,
        TaskCommand::Skip(command) => skip_occurrence(tracker, command).await,
        TaskCommand::Upcoming(command) => upcoming(tracker, command).await,
        TaskCommand::Delete(command) => delete_task(tracker, command).await,
    }
}

fn day_or_today<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    input: Option<&str>,
) -> Result<NaiveDate> {
    match input {
        Some(input) => parse_date(input, tracker.timezone()),
        None => Ok(tracker.today()),
    }
}

fn build_task(command: &AddTaskCommand, today: NaiveDate, tz: Tz) -> Result<NewTaskData> {
    let time = command.at.as_deref().map(parse_time).transpose()?;

    let kind = if command.is_routine() {
        let weekdays = command
            .days
            .as_deref()
            .map(parse_weekdays)
            .transpose()?
            .unwrap_or_default();
        let recurrence = command
            .every
            .map(|every| {
                RecurrenceType::from(every)
                    .to_recurrence(command.interval, command.unit.map(Into::into))
            })
            .transpose()
            .map_err(|e| anyhow!(CoreError::InvalidInput(e.to_string())))?;
        let start_date = match command.from.as_deref() {
            Some(from) => parse_date(from, tz)?,
            None => today,
        };
        let end_date = command.until.as_deref().map(|d| parse_date(d, tz)).transpose()?;

        NewTaskKind::Routine(NewRoutineData {
            weekdays,
            month_day: command.month_day,
            recurrence,
            start_date: Some(start_date),
            end_date,
        })
    } else {
        let date = match command.on.as_deref() {
            Some(on) => parse_date(on, tz)?,
            None => today,
        };
        NewTaskKind::OneTime { date }
    };

    Ok(NewTaskData {
        title: command.title.clone(),
        description: command.description.clone(),
        time,
        kind,
        notifications: NotificationPrefs {
            notify_before: command.remind,
            notify_in_advance: command.remind_before,
            time_unit: command.remind_unit.into(),
            collect_feedback: command.feedback,
        },
    })
}

pub async fn add_task<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: AddTaskCommand,
) -> Result<()> {
    let today = tracker.today();
    let data = build_task(&command, today, tracker.timezone())?;
    let task = tracker.add_task(data).await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let kind = if task.is_routine() { "routine" } else { "task" };
    println!(
        "{} Created {}: {}",
        "✓".style(success_style),
        kind,
        task.title.bright_white().bold()
    );
    println!("  {} Task ID: {}", "→".style(info_style), short_id(&task.id).yellow());
    println!("  {} Schedule: {}", "→".style(info_style), describe_schedule(&task).cyan());
    match recurrence::next_occurrence(&task, today, recurrence::MAX_SCAN_DAYS) {
        Some(next) => println!(
            "  {} Next: {}",
            "→".style(info_style),
            calendar::format_iso_date(next).cyan()
        ),
        None => println!(
            "  {} No occurrence within a year",
            "!".style(Style::new().yellow())
        ),
    }
    if task.notifications.notify_before && task.time.is_none() {
        println!(
            "  {} Reminders need a time of day (--at)",
            "!".style(Style::new().yellow())
        );
    }
    Ok(())
}

async fn toggle_task<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: TaskDateCommand,
) -> Result<()> {
    let id = resolve_task_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let date = day_or_today(tracker, command.date.as_deref())?;
    let result = tracker.toggle_task_completion(id, date).await?;

    match result {
        CompletionResult::Completed => println!(
            "{} Completed {} for {}",
            "✓".green().bold(),
            short_id(&id).yellow(),
            calendar::format_iso_date(date)
        ),
        CompletionResult::Reopened => println!(
            "Reopened {} for {}",
            short_id(&id).yellow(),
            calendar::format_iso_date(date)
        ),
    }
    Ok(())
}

async fn skip_occurrence<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: TaskDateCommand,
) -> Result<()> {
    let id = resolve_task_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let date = day_or_today(tracker, command.date.as_deref())?;
    let task = tracker.delete_occurrence(id, date).await?;
    println!(
        "Skipped '{}' on {}",
        task.title,
        calendar::format_iso_date(date)
    );
    Ok(())
}

async fn upcoming<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: UpcomingCommand,
) -> Result<()> {
    let id = resolve_task_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let task = tracker
        .repository()
        .find_task_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    let dates = recurrence::upcoming_occurrences(&task, tracker.today(), command.count);
    if dates.is_empty() {
        println!("No upcoming occurrences for '{}'.", task.title);
        return Ok(());
    }
    println!("Next occurrences of '{}':", task.title.bold());
    for date in dates {
        let done = recurrence::is_task_completed_for_date(&task, date);
        println!(
            "  {} {} {}",
            if done { "✓" } else { "•" },
            calendar::format_iso_date(date),
            calendar::weekday_name(date.weekday()).bright_black()
        );
    }
    Ok(())
}

async fn delete_task<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: DeleteCommand,
) -> Result<()> {
    let id = resolve_task_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let task = tracker
        .repository()
        .find_task_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    if !confirm(
        &format!("Are you sure you want to delete task '{}'?", task.title),
        command.force,
    ) {
        return Ok(());
    }
    tracker.delete_task(id).await?;
    println!("Deleted task '{}'", task.title);
    Ok(())
}
