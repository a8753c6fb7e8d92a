//! Application service tying storage, evaluators and reminders together.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::activity;
use crate::calendar;
use crate::error::CoreError;
use crate::models::{
    CompletionResult, Counter, CounterEntry, NewCounterData, NewCounterEntry, NewNotification,
    NewTaskData, Notification, Task, TaskKind,
};
use crate::notify::NotificationScheduler;
use crate::recurrence;
use crate::repository::Repository;
use crate::reset::{ResetEngine, ResetOutcome, ResetSummary};
use crate::timezone;
use crate::worker::{ChangeEvent, ChangeFeed};

/// Default age after which in-app notifications are purged.
pub const DEFAULT_NOTIFICATION_RETENTION_DAYS: u32 = 30;

/// Everything shown for one calendar day.
#[derive(Debug, Clone)]
pub struct DayView {
    pub date: NaiveDate,
    /// Scheduled tasks with their completion state, open ones first
    pub tasks: Vec<(Task, bool)>,
    /// Active counters with the value shown for the day
    pub counters: Vec<(Counter, u32)>,
    pub completion_percentage: u32,
}

/// Per-day presence markers for a month page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub in_month: bool,
    pub scheduled_tasks: usize,
    pub completed_tasks: usize,
    pub active_counters: usize,
}

/// Counts removed by a bulk wipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WipeSummary {
    pub tasks: u64,
    pub counters: u64,
}

/// One user's view of the tracker.
///
/// Collaborators are injected: the reminder scheduler and the change feed are
/// optional, so one-shot commands can run without timers.
pub struct Tracker<R: ?Sized> {
    repository: Arc<R>,
    engine: ResetEngine<R>,
    scheduler: Option<NotificationScheduler>,
    feed: Option<ChangeFeed>,
    user_id: String,
    timezone: Tz,
}

impl<R: Repository + ?Sized> Tracker<R> {
    pub fn new(repository: Arc<R>, user_id: impl Into<String>, timezone: Tz) -> Self {
        Self {
            engine: ResetEngine::new(Arc::clone(&repository)),
            repository,
            scheduler: None,
            feed: None,
            user_id: user_id.into(),
            timezone,
        }
    }

    pub fn with_scheduler(mut self, scheduler: NotificationScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_change_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn today(&self) -> NaiveDate {
        timezone::today_in(self.timezone, Utc::now())
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(feed) = &self.feed {
            feed.publish(event);
        }
    }

    /// Records an in-app notification; failures are logged, never raised.
    async fn record(&self, notification: NewNotification) {
        if let Err(e) = self
            .repository
            .add_notification(&self.user_id, notification)
            .await
        {
            warn!(error = %e, "could not record notification");
        }
    }

    /// Re-plans reminders from the stored tasks.
    pub async fn sync_reminders(&self) -> Result<(), CoreError> {
        if let Some(scheduler) = &self.scheduler {
            let tasks = self.repository.find_tasks(&self.user_id).await?;
            scheduler.update_tasks(tasks);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub async fn tasks(&self) -> Result<Vec<Task>, CoreError> {
        self.repository.find_tasks(&self.user_id).await
    }

    pub async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let task = self.repository.add_task(&self.user_id, data).await?;
        self.publish(ChangeEvent::TasksChanged);
        self.sync_reminders().await?;
        Ok(task)
    }

    /// Toggles completion of a task for `date`.
    ///
    /// # Behavior
    /// - One-time tasks flip their flag; `date` is ignored
    /// - Routines flip membership of `date` in their completed set
    /// - Completing records an in-app notification; completing a one-time
    ///   task also cancels its reminder
    pub async fn toggle_task_completion(
        &self,
        id: Uuid,
        date: NaiveDate,
    ) -> Result<CompletionResult, CoreError> {
        let (task, result) = self.repository.toggle_task_completion(id, date).await?;

        if result == CompletionResult::Completed {
            match &task.kind {
                TaskKind::OneTime(_) => {
                    if let Some(scheduler) = &self.scheduler {
                        scheduler.cancel_task(id);
                    }
                    if task.notifications.notify_before {
                        self.record(NewNotification::task(
                            "Task completed",
                            format!("You completed \"{}\"", task.title),
                            id,
                        ))
                        .await;
                    }
                }
                TaskKind::Routine(_) => {
                    self.record(NewNotification::task(
                        "Routine completed",
                        format!(
                            "You completed \"{}\" for {}",
                            task.title,
                            calendar::format_iso_date(date)
                        ),
                        id,
                    ))
                    .await;
                }
            }
        }

        self.publish(ChangeEvent::TasksChanged);
        self.sync_reminders().await?;
        Ok(result)
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel_task(id);
        }
        self.repository.delete_task(id).await?;
        self.publish(ChangeEvent::TasksChanged);
        Ok(())
    }

    /// Removes a single occurrence of a routine, keeping the series.
    pub async fn delete_occurrence(&self, id: Uuid, date: NaiveDate) -> Result<Task, CoreError> {
        let task = self.repository.exclude_occurrence(id, date).await?;
        self.publish(ChangeEvent::TasksChanged);
        self.sync_reminders().await?;
        Ok(task)
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    pub async fn counters(&self) -> Result<Vec<Counter>, CoreError> {
        self.repository.find_counters(&self.user_id).await
    }

    /// Brings every counter into the current period, then reloads them.
    pub async fn refresh_counters(&self) -> Result<(Vec<Counter>, ResetSummary), CoreError> {
        let counters = self.repository.find_counters(&self.user_id).await?;
        let summary = self.engine.run(&counters, self.today()).await;
        if summary.counters_reset > 0 || summary.counters_initialized > 0 {
            Ok((self.counters().await?, summary))
        } else {
            Ok((counters, summary))
        }
    }

    pub async fn add_counter(&self, data: NewCounterData) -> Result<Counter, CoreError> {
        let counter = self.repository.add_counter(&self.user_id, data).await?;
        self.publish(ChangeEvent::CounterAdded(counter.id));
        Ok(counter)
    }

    /// Loads a counter and rolls it into today's period, so an edit never
    /// lands in a period that has already ended.
    async fn current_counter(&self, id: Uuid) -> Result<Counter, CoreError> {
        let counter = self
            .repository
            .find_counter_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        match self.engine.reset_counter(&counter, self.today()).await? {
            ResetOutcome::UpToDate => Ok(counter),
            _ => self
                .repository
                .find_counter_by_id(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(id.to_string())),
        }
    }

    /// Adds one to a counter; crossing its goal records a notification.
    pub async fn increment_counter(&self, id: Uuid) -> Result<Counter, CoreError> {
        self.current_counter(id).await?;
        let counter = self.repository.increment_counter(id).await?;
        if counter.goal == Some(counter.current_value) {
            self.record(NewNotification::counter(
                "Goal reached!",
                format!(
                    "You reached the goal of {} for \"{}\"",
                    counter.current_value, counter.name
                ),
                id,
            ))
            .await;
        }
        self.publish(ChangeEvent::CounterChanged(id));
        Ok(counter)
    }

    pub async fn decrement_counter(&self, id: Uuid) -> Result<Counter, CoreError> {
        self.current_counter(id).await?;
        let counter = self.repository.decrement_counter(id).await?;
        self.publish(ChangeEvent::CounterChanged(id));
        Ok(counter)
    }

    pub async fn delete_counter(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_counter(id).await?;
        self.publish(ChangeEvent::CounterDeleted(id));
        Ok(())
    }

    /// Deletes every counter; archived history stays.
    pub async fn delete_all_counters(&self) -> Result<u64, CoreError> {
        let deleted = self.repository.delete_all_counters(&self.user_id).await?;
        self.record(NewNotification::system(
            "Counters deleted",
            "All counters were deleted",
        ))
        .await;
        Ok(deleted)
    }

    pub async fn counter_history(&self, id: Uuid) -> Result<Vec<CounterEntry>, CoreError> {
        self.repository.find_entries_for_counter(id, &self.user_id).await
    }

    pub async fn entries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CounterEntry>, CoreError> {
        self.repository
            .find_entries_in_range(&self.user_id, start, end)
            .await
    }

    /// Stores the live value of a counter as a manual entry dated today.
    ///
    /// A later snapshot on the same day replaces the earlier one; once the
    /// day has been archived by a reset the snapshot is a [`CoreError::Conflict`].
    pub async fn snapshot_counter(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<CounterEntry, CoreError> {
        let counter = self.current_counter(id).await?;
        self.repository
            .add_counter_entry(NewCounterEntry::manual_of(&counter, self.today(), note))
            .await
    }

    /// Drops counter history dated more than `retention_days` ago.
    pub async fn purge_entries(&self, retention_days: u32) -> Result<u64, CoreError> {
        let cutoff = self.today() - Duration::days(retention_days as i64);
        self.repository
            .delete_entries_before(&self.user_id, cutoff)
            .await
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub async fn day_view(&self, date: NaiveDate) -> Result<DayView, CoreError> {
        let tasks = self.tasks().await?;
        let (counters, _) = self.refresh_counters().await?;
        let today = self.today();

        let scheduled = recurrence::tasks_for_date(&tasks, date)
            .into_iter()
            .map(|task| (task.clone(), recurrence::is_task_completed_for_date(task, date)))
            .collect();
        let active = activity::counters_for_date(&counters, date)
            .into_iter()
            .map(|counter| (counter.clone(), activity::display_value(counter, date, today)))
            .collect();

        Ok(DayView {
            date,
            tasks: scheduled,
            counters: active,
            completion_percentage: recurrence::completion_percentage(&tasks, date),
        })
    }

    pub async fn month_view(&self, month: NaiveDate) -> Result<Vec<DaySummary>, CoreError> {
        let tasks = self.tasks().await?;
        let counters = self.counters().await?;
        let first = calendar::start_of_month(month);
        let last = calendar::end_of_month(month);

        Ok(calendar::month_grid(month)
            .into_iter()
            .map(|date| {
                let scheduled = recurrence::tasks_for_date(&tasks, date);
                DaySummary {
                    date,
                    in_month: date >= first && date <= last,
                    completed_tasks: scheduled
                        .iter()
                        .filter(|task| recurrence::is_task_completed_for_date(task, date))
                        .count(),
                    scheduled_tasks: scheduled.len(),
                    active_counters: activity::counters_for_date(&counters, date).len(),
                }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // In-app notifications
    // ------------------------------------------------------------------

    pub async fn notifications(&self) -> Result<Vec<Notification>, CoreError> {
        self.repository.find_notifications(&self.user_id).await
    }

    pub async fn unread_count(&self) -> Result<u64, CoreError> {
        self.repository
            .count_unread_notifications(&self.user_id)
            .await
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.mark_notification_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<u64, CoreError> {
        self.repository
            .mark_all_notifications_read(&self.user_id)
            .await
    }

    pub async fn delete_notification(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_notification(id).await
    }

    pub async fn clear_notifications(&self) -> Result<u64, CoreError> {
        self.repository.delete_all_notifications(&self.user_id).await
    }

    /// Deletes notifications older than `days_to_keep` days.
    pub async fn purge_notifications(&self, days_to_keep: u32) -> Result<u64, CoreError> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days_to_keep as i64);
        let removed = self
            .repository
            .delete_notifications_before(&self.user_id, cutoff)
            .await?;
        debug!(removed, days_to_keep, "old notifications purged");
        Ok(removed)
    }

    /// Removes all tasks and counters and cancels every reminder.
    pub async fn reset_all_data(&self) -> Result<WipeSummary, CoreError> {
        if let Some(scheduler) = &self.scheduler {
            scheduler.clear_all();
        }
        let tasks = self.repository.delete_all_tasks(&self.user_id).await?;
        let counters = self.repository.delete_all_counters(&self.user_id).await?;
        self.publish(ChangeEvent::TasksChanged);
        self.sync_reminders().await?;
        Ok(WipeSummary { tasks, counters })
    }
}
