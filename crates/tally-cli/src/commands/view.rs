use anyhow::Result;
use tally_core::repository::Repository;
use tally_core::service::Tracker;

use crate::cli::{CalendarCommand, TodayCommand};
use crate::parser::parse_date;
use crate::views::table::{display_day, display_month};

pub async fn today<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: TodayCommand,
) -> Result<()> {
    let today = tracker.today();
    let date = match command.date.as_deref() {
        Some(date) => parse_date(date, tracker.timezone())?,
        None => today,
    };
    let view = tracker.day_view(date).await?;
    display_day(&view, today);

    let unread = tracker.unread_count().await?;
    if unread > 0 {
        println!("{unread} unread notification(s): tally notifications list");
    }
    Ok(())
}

pub async fn calendar<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: CalendarCommand,
) -> Result<()> {
    let today = tracker.today();
    let month = match command.month.as_deref() {
        Some(month) => parse_date(month, tracker.timezone())?,
        None => today,
    };
    let days = tracker.month_view(month).await?;
    display_month(&days, month, today);
    Ok(())
}
