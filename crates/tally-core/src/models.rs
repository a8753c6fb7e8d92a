use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Tasks
// ============================================================================

/// A single commitment, either dated once or repeating on a cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Time of day the task happens; reminders are computed from it
    pub time: Option<NaiveTime>,
    pub kind: TaskKind,
    pub notifications: NotificationPrefs,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_routine(&self) -> bool {
        matches!(self.kind, TaskKind::Routine(_))
    }
}

/// Variant data of a task. Fixed at creation: turning a one-time task into a
/// routine means creating a new task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskKind {
    OneTime(OneTimeTask),
    Routine(RoutineTask),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OneTimeTask {
    pub date: NaiveDate,
    pub is_completed: bool,
}

/// A repeating series. Cadence precedence is weekdays, then month day, then
/// the generic interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineTask {
    pub weekdays: HashSet<Weekday>,
    /// Day of month, 1..=31
    pub month_day: Option<u32>,
    pub recurrence: Option<Recurrence>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Occurrences marked done
    pub completed_dates: BTreeSet<NaiveDate>,
    /// Occurrences removed from the series without deleting it
    pub excluded_dates: BTreeSet<NaiveDate>,
}

/// Every `interval` `unit`s counted from the routine's start date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recurrence {
    pub interval: u32,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Days,
    Weeks,
    Months,
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeUnit::Days => write!(f, "days"),
            TimeUnit::Weeks => write!(f, "weeks"),
            TimeUnit::Months => write!(f, "months"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid time unit: {0}")]
pub struct ParseTimeUnitError(String);

impl FromStr for TimeUnit {
    type Err = ParseTimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "days" => Ok(TimeUnit::Days),
            "week" | "weeks" => Ok(TimeUnit::Weeks),
            "month" | "months" => Ok(TimeUnit::Months),
            _ => Err(ParseTimeUnitError(s.to_string())),
        }
    }
}

/// Named cadences offered when creating a routine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

impl RecurrenceType {
    /// Resolves the named cadence to an interval. `Custom` takes the explicit
    /// interval and unit and rejects a zero interval.
    pub fn to_recurrence(
        self,
        interval: Option<u32>,
        unit: Option<TimeUnit>,
    ) -> Result<Recurrence, ParseRecurrenceTypeError> {
        match self {
            RecurrenceType::Weekly => Ok(Recurrence { interval: 1, unit: TimeUnit::Weeks }),
            RecurrenceType::Biweekly => Ok(Recurrence { interval: 2, unit: TimeUnit::Weeks }),
            RecurrenceType::Monthly => Ok(Recurrence { interval: 1, unit: TimeUnit::Months }),
            RecurrenceType::Custom => match (interval, unit) {
                (Some(interval), Some(unit)) if interval > 0 => Ok(Recurrence { interval, unit }),
                _ => Err(ParseRecurrenceTypeError(
                    "custom recurrence needs an interval >= 1 and a unit".to_string(),
                )),
            },
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence: {0}")]
pub struct ParseRecurrenceTypeError(String);

impl FromStr for RecurrenceType {
    type Err = ParseRecurrenceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(RecurrenceType::Weekly),
            "biweekly" => Ok(RecurrenceType::Biweekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "custom" => Ok(RecurrenceType::Custom),
            _ => Err(ParseRecurrenceTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationTimeUnit {
    #[default]
    Minutes,
    Hours,
}

impl std::fmt::Display for NotificationTimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationTimeUnit::Minutes => write!(f, "minutes"),
            NotificationTimeUnit::Hours => write!(f, "hours"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid notification time unit: {0}")]
pub struct ParseNotificationTimeUnitError(String);

impl FromStr for NotificationTimeUnit {
    type Err = ParseNotificationTimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m" | "min" | "minute" | "minutes" => Ok(NotificationTimeUnit::Minutes),
            "h" | "hour" | "hours" => Ok(NotificationTimeUnit::Hours),
            _ => Err(ParseNotificationTimeUnitError(s.to_string())),
        }
    }
}

/// Reminder settings carried by every task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPrefs {
    pub notify_before: bool,
    /// How far ahead to remind, in `time_unit`s. `None` or 0 means the default.
    pub notify_in_advance: Option<u32>,
    pub time_unit: NotificationTimeUnit,
    /// Offer feedback actions on the reminder
    pub collect_feedback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewRoutineData {
    pub weekdays: Vec<Weekday>,
    pub month_day: Option<u32>,
    pub recurrence: Option<Recurrence>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub enum NewTaskKind {
    OneTime { date: NaiveDate },
    Routine(NewRoutineData),
}

#[derive(Debug, Clone)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub time: Option<NaiveTime>,
    pub kind: NewTaskKind,
    pub notifications: NotificationPrefs,
}

/// Outcome of toggling a task for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionResult {
    Completed,
    Reopened,
}

// ============================================================================
// Counters
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    Daily,
    Weekly,
    Monthly,
    /// Never resets
    Cumulative,
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterKind::Daily => write!(f, "daily"),
            CounterKind::Weekly => write!(f, "weekly"),
            CounterKind::Monthly => write!(f, "monthly"),
            CounterKind::Cumulative => write!(f, "cumulative"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid counter type: {0}")]
pub struct ParseCounterKindError(String);

impl FromStr for CounterKind {
    type Err = ParseCounterKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(CounterKind::Daily),
            "weekly" => Ok(CounterKind::Weekly),
            "monthly" => Ok(CounterKind::Monthly),
            "cumulative" => Ok(CounterKind::Cumulative),
            _ => Err(ParseCounterKindError(s.to_string())),
        }
    }
}

/// A numeric tally with a reset cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Counter {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: CounterKind,
    /// Anchors weekly/monthly cadence. Absent only on legacy records, which
    /// are never active.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub current_value: u32,
    pub goal: Option<u32>,
    /// Day the current period started accumulating
    pub last_reset_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Counter {
    pub fn goal_reached(&self) -> bool {
        self.goal.is_some_and(|goal| self.current_value >= goal)
    }
}

#[derive(Debug, Clone)]
pub struct NewCounterData {
    pub name: String,
    pub description: Option<String>,
    pub kind: CounterKind,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub goal: Option<u32>,
}

/// How a counter entry came to be.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    /// Written by a period rollover; at most one per counter and date
    Reset,
    /// Taken on demand; never consulted by the reset engine
    Manual,
}

impl EntrySource {
    pub fn is_manual(self) -> bool {
        matches!(self, EntrySource::Manual)
    }
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::Reset => write!(f, "reset"),
            EntrySource::Manual => write!(f, "manual"),
        }
    }
}

/// Immutable snapshot of a counter's value for one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct CounterEntry {
    pub id: Uuid,
    pub counter_id: Uuid,
    pub user_id: String,
    /// Counter name at the time of writing
    pub name: String,
    pub value: u32,
    pub date: NaiveDate,
    pub source: EntrySource,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCounterEntry {
    pub counter_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub value: u32,
    pub date: NaiveDate,
    pub source: EntrySource,
    pub note: Option<String>,
}

impl NewCounterEntry {
    /// Period archive of `counter`'s live value, dated `date`.
    pub fn archive_of(counter: &Counter, date: NaiveDate) -> Self {
        Self {
            counter_id: counter.id,
            user_id: counter.user_id.clone(),
            name: counter.name.clone(),
            value: counter.current_value,
            date,
            source: EntrySource::Reset,
            note: None,
        }
    }

    /// On-demand snapshot of `counter`'s live value.
    pub fn manual_of(counter: &Counter, date: NaiveDate, note: Option<String>) -> Self {
        Self {
            source: EntrySource::Manual,
            note,
            ..Self::archive_of(counter, date)
        }
    }
}

// ============================================================================
// In-app notifications
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Task,
    Counter,
    System,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Task => write!(f, "task"),
            NotificationKind::Counter => write!(f, "counter"),
            NotificationKind::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub kind: NotificationKind,
    /// Task or counter the notification is about
    pub related_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
}

impl NewNotification {
    pub fn system(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::System,
            related_id: None,
        }
    }

    pub fn task(title: impl Into<String>, message: impl Into<String>, task_id: Uuid) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Task,
            related_id: Some(task_id),
        }
    }

    pub fn counter(title: impl Into<String>, message: impl Into<String>, counter_id: Uuid) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Counter,
            related_id: Some(counter_id),
        }
    }
}
