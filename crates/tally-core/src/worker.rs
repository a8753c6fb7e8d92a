//! Background job that keeps counters in their current period.
//!
//! The worker runs a reset pass on start, whenever a [`ChangeEvent`] arrives
//! and at every local midnight, until the shutdown signal fires.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::repository::Repository;
use crate::reset::{ResetEngine, ResetSummary};
use crate::timezone;

/// Capacity of the change-event channel.
pub const EVENT_BUFFER: usize = 64;

/// Something changed in storage that may need a reset pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    CounterAdded(Uuid),
    CounterChanged(Uuid),
    CounterDeleted(Uuid),
    TasksChanged,
    /// Explicit request for a pass, e.g. after the app regains focus
    Refresh,
}

impl ChangeEvent {
    fn concerns_counters(&self) -> bool {
        !matches!(self, ChangeEvent::TasksChanged | ChangeEvent::CounterDeleted(_))
    }
}

/// Sending half of the change-event port. Publishing never blocks; when the
/// buffer is full the event is dropped since the next pass covers it.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: mpsc::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn channel() -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: ChangeEvent) {
        if let Err(e) = self.sender.try_send(event) {
            debug!(error = %e, "change event dropped");
        }
    }
}

pub struct ResetWorker<R: ?Sized> {
    repository: Arc<R>,
    engine: ResetEngine<R>,
    user_id: String,
    timezone: Tz,
    events: mpsc::Receiver<ChangeEvent>,
    shutdown: broadcast::Receiver<()>,
}

impl<R: Repository + ?Sized> ResetWorker<R> {
    pub fn new(
        repository: Arc<R>,
        user_id: impl Into<String>,
        timezone: Tz,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            engine: ResetEngine::new(Arc::clone(&repository)),
            repository,
            user_id: user_id.into(),
            timezone,
            events,
            shutdown,
        }
    }

    /// One reset pass over every counter of the user.
    pub async fn check(&self, today: NaiveDate) -> Result<ResetSummary, CoreError> {
        let counters = self.repository.find_counters(&self.user_id).await?;
        let summary = self.engine.run(&counters, today).await;

        if summary.counters_reset > 0 || summary.counters_initialized > 0 {
            info!(
                reset = summary.counters_reset,
                initialized = summary.counters_initialized,
                duration_ms = summary.duration_ms,
                "reset pass complete"
            );
        }
        if summary.has_errors() {
            warn!(failed = summary.errors.len(), "some counters could not be reset");
        }
        Ok(summary)
    }

    async fn check_now(&self) {
        let today = timezone::today_in(self.timezone, Utc::now());
        if let Err(e) = self.check(today).await {
            warn!(error = %e, "reset pass failed");
        }
    }

    /// Runs until shutdown is signalled (or its sender is dropped).
    pub async fn run(mut self) -> Result<(), CoreError> {
        self.check_now().await;
        let mut events_open = true;

        loop {
            let wait = timezone::until_next_midnight(self.timezone, Utc::now());
            debug!(seconds = wait.as_secs(), "reset timer armed");

            tokio::select! {
                biased;

                event = self.events.recv(), if events_open => match event {
                    Some(event) if event.concerns_counters() => {
                        debug!(?event, "change event");
                        self.check_now().await;
                    }
                    Some(_) => {}
                    None => {
                        debug!("change feed closed, timer only");
                        events_open = false;
                    }
                },
                _ = tokio::time::sleep(wait) => {
                    debug!("local midnight reached");
                    self.check_now().await;
                }
                _ = self.shutdown.recv() => {
                    info!("reset worker stopping");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{CounterKind, NewCounterData};
    use crate::repository::{CounterEntryRepository, CounterRepository, SqliteRepository};
    use crate::reset::ResetStore;
    use chrono::Duration;

    async fn repository() -> Arc<SqliteRepository> {
        let pool = db::establish_in_memory().await.unwrap();
        Arc::new(SqliteRepository::new(pool))
    }

    async fn stale_counter(repo: &SqliteRepository, last_reset: NaiveDate, value: u32) -> Uuid {
        let counter = repo
            .add_counter(
                "user-1",
                NewCounterData {
                    name: "Pages read".to_string(),
                    description: None,
                    kind: CounterKind::Daily,
                    start_date: last_reset - Duration::days(10),
                    end_date: None,
                    goal: None,
                },
            )
            .await
            .unwrap();
        repo.commit_reset(counter.id, None, last_reset, 0).await.unwrap();
        for _ in 0..value {
            repo.increment_counter(counter.id).await.unwrap();
        }
        counter.id
    }

    #[tokio::test]
    async fn test_check_resets_stale_counters() {
        let repo = repository().await;
        let id = stale_counter(&repo, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), 3).await;

        let (_feed, events) = ChangeFeed::channel();
        let (_shutdown_tx, shutdown) = broadcast::channel(1);
        let worker = ResetWorker::new(repo.clone(), "user-1", chrono_tz::UTC, events, shutdown);

        let today = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let summary = worker.check(today).await.unwrap();
        assert_eq!(summary.counters_reset, 1);

        let again = worker.check(today).await.unwrap();
        assert_eq!(again.counters_reset, 0);

        let counter = repo.find_counter_by_id(id).await.unwrap().unwrap();
        assert_eq!(counter.current_value, 0);
        let history = repo.find_entries_for_counter(id, "user-1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 3);
    }

    #[tokio::test]
    async fn test_run_handles_events_then_stops() {
        let repo = repository().await;
        let today = timezone::today_in(chrono_tz::UTC, Utc::now());
        let id = stale_counter(&repo, today - Duration::days(1), 2).await;

        let (feed, events) = ChangeFeed::channel();
        let (shutdown_tx, shutdown) = broadcast::channel(1);
        let worker = ResetWorker::new(repo.clone(), "user-1", chrono_tz::UTC, events, shutdown);
        let handle = tokio::spawn(worker.run());

        feed.publish(ChangeEvent::CounterChanged(id));
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();

        let counter = repo.find_counter_by_id(id).await.unwrap().unwrap();
        assert_eq!(counter.current_value, 0);
        assert_eq!(counter.last_reset_date, Some(today));
    }

    #[tokio::test]
    async fn test_closed_feed_keeps_worker_alive_until_shutdown() {
        let repo = repository().await;
        let (feed, events) = ChangeFeed::channel();
        drop(feed);
        let (shutdown_tx, shutdown) = broadcast::channel(1);
        let handle = tokio::spawn(
            ResetWorker::new(repo, "user-1", chrono_tz::UTC, events, shutdown).run(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
