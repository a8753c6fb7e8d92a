use anyhow::Result;
use tally_core::repository::Repository;
use tally_core::service::Tracker;

use crate::cli::NotificationCommand;
use crate::commands::confirm;
use crate::config::Config;
use crate::util::resolve_notification_id;
use crate::views::table::display_notifications;

pub async fn notification_command<R: Repository + ?Sized>(
    tracker: &Tracker<R>,
    command: NotificationCommand,
    config: &Config,
) -> Result<()> {
    match command {
        NotificationCommand::List => {
            let notifications = tracker.notifications().await?;
            display_notifications(&notifications, tracker.timezone());
            let unread = notifications.iter().filter(|n| !n.read).count();
            if unread > 0 {
                println!("{unread} unread");
            }
        }
        NotificationCommand::Read(command) => {
            if command.all {
                let marked = tracker.mark_all_read().await?;
                println!("Marked {marked} notification(s) as read");
            } else if let Some(short_id) = command.id {
                let id =
                    resolve_notification_id(tracker.repository(), tracker.user_id(), &short_id)
                        .await?;
                tracker.mark_read(id).await?;
                println!("Marked as read");
            }
        }
        NotificationCommand::Delete(command) => {
            let id =
                resolve_notification_id(tracker.repository(), tracker.user_id(), &command.id)
                    .await?;
            if confirm("Delete this notification?", command.force) {
                tracker.delete_notification(id).await?;
                println!("Deleted notification");
            }
        }
        NotificationCommand::Clear(flag) => {
            if confirm("Delete every notification?", flag.force) {
                let deleted = tracker.clear_notifications().await?;
                println!("Deleted {deleted} notification(s)");
            }
        }
        NotificationCommand::Purge(command) => {
            let days = command.days.unwrap_or(config.notifications.retention_days);
            let removed = tracker.purge_notifications(days).await?;
            println!("Removed {removed} notification(s) older than {days} days");
        }
    }
    Ok(())
}
