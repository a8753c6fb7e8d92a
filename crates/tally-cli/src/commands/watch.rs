use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tally_core::notify::{LogTransport, NotificationScheduler, Permission, ReminderPolicy};
use tally_core::repository::Repository;
use tally_core::service::Tracker;
use tally_core::worker::{ChangeEvent, ChangeFeed, ResetWorker};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Config;

/// How often storage is re-read for changes made by other `tally` processes.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the reset worker and the reminder scheduler until Ctrl-C.
pub async fn watch<R: Repository + 'static>(repository: Arc<R>, config: &Config) -> Result<()> {
    let tz = config.tz();
    let (feed, events) = ChangeFeed::channel();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let scheduler = NotificationScheduler::new(
        Arc::new(LogTransport),
        ReminderPolicy {
            default_advance_minutes: config.notifications.default_advance_minutes,
        },
        tz,
        config.user_id.clone(),
    );
    let tracker = Tracker::new(Arc::clone(&repository), config.user_id.clone(), tz)
        .with_scheduler(scheduler.clone())
        .with_change_feed(feed.clone());

    let worker = ResetWorker::new(repository, config.user_id.clone(), tz, events, shutdown_rx);
    let worker_handle = tokio::spawn(worker.run());

    if config.notifications.enabled {
        if scheduler.request_permission().await == Permission::Granted {
            scheduler.start();
        } else {
            warn!("reminders are not permitted, running without them");
        }
    }
    tracker.sync_reminders().await?;

    let purged = tracker
        .purge_notifications(config.notifications.retention_days)
        .await?;
    info!(purged, "old notifications removed");

    println!(
        "Watching as '{}' in {}; press Ctrl-C to stop.",
        config.user_id, tz
    );

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
            _ = poll.tick() => {
                feed.publish(ChangeEvent::Refresh);
                if let Err(e) = tracker.sync_reminders().await {
                    warn!(error = %e, "could not refresh reminders");
                }
            }
        }
    }

    scheduler.stop();
    let _ = shutdown_tx.send(());
    worker_handle.await??;
    println!("Stopped.");
    Ok(())
}
