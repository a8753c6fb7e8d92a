use anyhow::Result;
use chrono::NaiveDate;
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};
use tally_core::calendar;
use tally_core::error::CoreError;
use tally_core::models::{Counter, NewCounterData};
use tally_core::repository::Repository;
use tally_core::service::Tracker;

use crate::cli::{
    AddCounterCommand, CounterCommand, DeleteCommand, EntriesCommand, SnapshotCommand,
};
use crate::commands::confirm;
use crate::config::Config;
use crate::parser::parse_date;
use crate::util::{resolve_counter_id, short_id};
use crate::views::table::{display_counters, display_entries};

pub async fn counter_command<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: CounterCommand,
    config: &Config,
) -> Result<()> {
    match command {
        CounterCommand::Add(command) => add_counter(tracker, command).await,
        CounterCommand::List => {
            let (counters, _) = tracker.refresh_counters().await?;
            display_counters(&counters);
            Ok(())
        }
        CounterCommand::Inc(command) => {
            let id = resolve_counter_id(tracker.repository(), tracker.user_id(), &command.id).await?;
            let counter = tracker.increment_counter(id).await?;
            print_value(&counter);
            if counter.goal == Some(counter.current_value) {
                println!("{} Goal reached!", "★".yellow().bold());
            }
            Ok(())
        }
        CounterCommand::Dec(command) => {
            let id = resolve_counter_id(tracker.repository(), tracker.user_id(), &command.id).await?;
            let counter = tracker.decrement_counter(id).await?;
            print_value(&counter);
            Ok(())
        }
        CounterCommand::History(command) => {
            let id = resolve_counter_id(tracker.repository(), tracker.user_id(), &command.id).await?;
            let entries = tracker.counter_history(id).await?;
            display_entries(&entries);
            Ok(())
        }
        CounterCommand::Entries(command) => entries_between(tracker, command).await,
        CounterCommand::Snapshot(command) => snapshot(tracker, command).await,
        CounterCommand::Delete(command) => delete_counter(tracker, command).await,
        CounterCommand::Clear(flag) => {
            if !confirm("Delete every counter? History is kept.", flag.force) {
                return Ok(());
            }
            let deleted = tracker.delete_all_counters().await?;
            println!("Deleted {deleted} counter(s)");
            Ok(())
        }
        CounterCommand::Purge(command) => {
            let days = command.days.unwrap_or(config.counters.entry_retention_days);
            let removed = tracker.purge_entries(days).await?;
            println!("Removed {removed} history entries older than {days} days");
            Ok(())
        }
    }
}

fn print_value(counter: &Counter) {
    match counter.goal {
        Some(goal) => println!(
            "{}: {} / {}",
            counter.name.bold(),
            counter.current_value.cyan(),
            goal
        ),
        None => println!("{}: {}", counter.name.bold(), counter.current_value.cyan()),
    }
}

fn build_counter(command: &AddCounterCommand, tz: Tz, today: NaiveDate) -> Result<NewCounterData> {
    let start_date = match command.start.as_deref() {
        Some(start) => parse_date(start, tz)?,
        None => today,
    };
    let end_date = command.end.as_deref().map(|end| parse_date(end, tz)).transpose()?;
    if command.goal == Some(0) {
        return Err(CoreError::InvalidInput("Goal must be a positive number".to_string()).into());
    }
    Ok(NewCounterData {
        name: command.name.clone(),
        description: command.description.clone(),
        kind: command.kind.into(),
        start_date,
        end_date,
        goal: command.goal,
    })
}

async fn add_counter<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: AddCounterCommand,
) -> Result<()> {
    let data = build_counter(&command, tracker.timezone(), tracker.today())?;
    let counter = tracker.add_counter(data).await?;
    // Stamp the first period right away
    tracker.refresh_counters().await?;

    let info_style = Style::new().blue();
    println!(
        "{} Created {} counter: {}",
        "✓".style(Style::new().green().bold()),
        counter.kind,
        counter.name.bright_white().bold()
    );
    println!("  {} Counter ID: {}", "→".style(info_style), short_id(&counter.id).yellow());
    if let Some(start) = counter.start_date {
        println!(
            "  {} Active from: {}",
            "→".style(info_style),
            calendar::format_iso_date(start).cyan()
        );
    }
    Ok(())
}

async fn entries_between<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: EntriesCommand,
) -> Result<()> {
    let tz = tracker.timezone();
    let from = parse_date(&command.from, tz)?;
    let to = match command.to.as_deref() {
        Some(to) => parse_date(to, tz)?,
        None => tracker.today(),
    };
    let entries = tracker.entries_between(from, to).await?;
    display_entries(&entries);
    Ok(())
}

async fn snapshot<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: SnapshotCommand,
) -> Result<()> {
    let id = resolve_counter_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let entry = tracker.snapshot_counter(id, command.note).await?;
    println!(
        "Saved {} = {} on {}",
        entry.name.bold(),
        entry.value,
        calendar::format_iso_date(entry.date)
    );
    Ok(())
}

async fn delete_counter<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: DeleteCommand,
) -> Result<()> {
    let id = resolve_counter_id(tracker.repository(), tracker.user_id(), &command.id).await?;
    let counter = tracker
        .repository()
        .find_counter_by_id(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    if !confirm(
        &format!("Are you sure you want to delete counter '{}'?", counter.name),
        command.force,
    ) {
        return Ok(());
    }
    tracker.delete_counter(id).await?;
    println!("Deleted counter '{}'", counter.name);
    Ok(())
}
