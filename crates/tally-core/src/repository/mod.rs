use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    CompletionResult, Counter, CounterEntry, NewCounterData, NewCounterEntry, NewNotification,
    NewTaskData, Notification, Task,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub mod counters;
pub mod entries;
pub mod notifications;
pub mod tasks;

/// Domain-specific trait for task operations
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, user_id: &str, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Task>, CoreError>;
    /// All readable tasks of a user; rows with corrupt dates are skipped.
    async fn find_tasks(&self, user_id: &str) -> Result<Vec<Task>, CoreError>;
    /// Flips completion of `id` for `date` and persists the new state.
    async fn toggle_task_completion(
        &self,
        id: Uuid,
        date: NaiveDate,
    ) -> Result<(Task, CompletionResult), CoreError>;
    /// Removes one occurrence of a routine from its series.
    async fn exclude_occurrence(&self, id: Uuid, date: NaiveDate) -> Result<Task, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
    async fn delete_all_tasks(&self, user_id: &str) -> Result<u64, CoreError>;
}

/// Domain-specific trait for counter operations
#[async_trait]
pub trait CounterRepository {
    async fn add_counter(&self, user_id: &str, data: NewCounterData) -> Result<Counter, CoreError>;
    async fn find_counter_by_id(&self, id: Uuid) -> Result<Option<Counter>, CoreError>;
    async fn find_counters_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Counter>, CoreError>;
    /// All readable counters of a user; rows with corrupt dates are skipped.
    async fn find_counters(&self, user_id: &str) -> Result<Vec<Counter>, CoreError>;
    /// Adds one to the live value in place.
    async fn increment_counter(&self, id: Uuid) -> Result<Counter, CoreError>;
    /// Subtracts one from the live value; a counter at zero stays at zero.
    async fn decrement_counter(&self, id: Uuid) -> Result<Counter, CoreError>;
    async fn delete_counter(&self, id: Uuid) -> Result<(), CoreError>;
    async fn delete_all_counters(&self, user_id: &str) -> Result<u64, CoreError>;
}

/// Domain-specific trait for counter history
#[async_trait]
pub trait CounterEntryRepository {
    async fn add_counter_entry(&self, entry: NewCounterEntry) -> Result<CounterEntry, CoreError>;
    /// History of one counter, newest first.
    async fn find_entries_for_counter(
        &self,
        counter_id: Uuid,
        user_id: &str,
    ) -> Result<Vec<CounterEntry>, CoreError>;
    /// Entries dated within `[start, end]`, newest first.
    async fn find_entries_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CounterEntry>, CoreError>;
    /// Drops entries dated before `before`.
    async fn delete_entries_before(&self, user_id: &str, before: NaiveDate)
        -> Result<u64, CoreError>;
}

/// Domain-specific trait for in-app notifications
#[async_trait]
pub trait NotificationRepository {
    async fn add_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<Notification, CoreError>;
    /// Newest first.
    async fn find_notifications(&self, user_id: &str) -> Result<Vec<Notification>, CoreError>;
    async fn find_notifications_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Notification>, CoreError>;
    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64, CoreError>;
    async fn mark_notification_read(&self, id: Uuid) -> Result<(), CoreError>;
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, CoreError>;
    async fn delete_notification(&self, id: Uuid) -> Result<(), CoreError>;
    async fn delete_all_notifications(&self, user_id: &str) -> Result<u64, CoreError>;
    /// Drops notifications older than `before`.
    async fn delete_notifications_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    TaskRepository
    + CounterRepository
    + CounterEntryRepository
    + NotificationRepository
    + crate::reset::ResetStore
    + Send
    + Sync
{
}

impl<T> Repository for T where
    T: TaskRepository
        + CounterRepository
        + CounterEntryRepository
        + NotificationRepository
        + crate::reset::ResetStore
        + Send
        + Sync
{
}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// `LIKE` pattern matching ids whose hex form starts with `short_id`.
///
/// Ids are stored as 16-byte blobs, so the match runs against `hex(id)`;
/// hyphens in the prefix are ignored.
pub(crate) fn short_id_pattern(short_id: &str) -> Result<String, CoreError> {
    let mut pattern = String::with_capacity(short_id.len() + 1);
    for c in short_id.chars().filter(|c| *c != '-') {
        if !c.is_ascii_hexdigit() {
            return Err(CoreError::InvalidInput(format!(
                "'{}' is not a valid id prefix",
                short_id
            )));
        }
        pattern.push(c.to_ascii_lowercase());
    }
    if pattern.is_empty() {
        return Err(CoreError::InvalidInput("Empty id prefix".to_string()));
    }
    pattern.push('%');
    Ok(pattern)
}
