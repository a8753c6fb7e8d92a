//! Reminder planning and delivery.
//!
//! The policy half is pure: given a task and the local wall clock it decides
//! when (if ever) a reminder should fire. [`NotificationScheduler`] turns
//! plans into tokio timers keyed by task and occurrence, and hands fired
//! reminders to a [`NotificationTransport`].

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::format_iso_date;
use crate::error::CoreError;
use crate::models::{NotificationKind, NotificationPrefs, NotificationTimeUnit, Task, TaskKind};
use crate::recurrence::{self, MAX_SCAN_DAYS};
use crate::timezone;

pub const DEFAULT_ADVANCE_MINUTES: u32 = 10;

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Not asked yet
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Default => write!(f, "default"),
            Permission::Granted => write!(f, "granted"),
            Permission::Denied => write!(f, "denied"),
        }
    }
}

/// Button offered on a delivered reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOptions {
    pub kind: NotificationKind,
    pub related_id: Option<Uuid>,
    /// Replaces an earlier notification with the same tag
    pub tag: Option<String>,
    pub actions: Vec<NotificationAction>,
}

/// Delivery channel for reminders (desktop, push service, log).
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn is_supported(&self) -> bool;
    fn permission(&self) -> Permission;
    async fn request_permission(&self) -> Permission;
    /// Shows a notification on this device.
    async fn show(&self, title: &str, body: &str, options: &DeliveryOptions)
        -> Result<(), CoreError>;
    /// Routes a notification to every device of `user_id`.
    async fn push(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        options: &DeliveryOptions,
    ) -> Result<(), CoreError>;
}

/// Transport that writes reminders to the log. Always supported and granted.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(
        &self,
        title: &str,
        body: &str,
        options: &DeliveryOptions,
    ) -> Result<(), CoreError> {
        info!(
            target: "tally::reminder",
            kind = %options.kind,
            tag = options.tag.as_deref().unwrap_or(""),
            "{title}: {body}"
        );
        Ok(())
    }

    async fn push(
        &self,
        user_id: &str,
        title: &str,
        body: &str,
        options: &DeliveryOptions,
    ) -> Result<(), CoreError> {
        debug!(user_id, "push routed to log");
        self.show(title, body, options).await
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Timer identity: the task alone for one-time reminders, task plus
/// occurrence date for routines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub task_id: Uuid,
    pub occurrence: Option<NaiveDate>,
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.occurrence {
            Some(date) => write!(f, "{}_{}", self.task_id, format_iso_date(date)),
            None => write!(f, "{}", self.task_id),
        }
    }
}

/// A reminder ready to be armed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderPlan {
    pub key: ScheduleKey,
    pub occurrence: NaiveDate,
    /// Local wall-clock time the reminder fires at
    pub fire_at: NaiveDateTime,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Offset used when a task does not set its own
    pub default_advance_minutes: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            default_advance_minutes: DEFAULT_ADVANCE_MINUTES,
        }
    }
}

/// Title shown on a reminder, naming the advance when the task sets one.
pub fn reminder_title(prefs: &NotificationPrefs) -> String {
    match (prefs.notify_in_advance, prefs.time_unit) {
        (None | Some(0), _) => "Reminder".to_string(),
        (Some(1), NotificationTimeUnit::Hours) => "Reminder (in 1 hour)".to_string(),
        (Some(n), NotificationTimeUnit::Hours) => format!("Reminder (in {n} hours)"),
        (Some(1), NotificationTimeUnit::Minutes) => "Reminder (in 1 minute)".to_string(),
        (Some(n), NotificationTimeUnit::Minutes) => format!("Reminder (in {n} minutes)"),
    }
}

fn reminder_actions(prefs: &NotificationPrefs) -> Vec<NotificationAction> {
    let mut actions = vec![
        NotificationAction::new("complete-task", "Done"),
        NotificationAction::new("snooze", "Snooze 15m"),
    ];
    if prefs.collect_feedback {
        actions.extend([
            NotificationAction::new("feedback-good", "😊"),
            NotificationAction::new("feedback-neutral", "😐"),
            NotificationAction::new("feedback-bad", "😞"),
        ]);
    }
    actions
}

impl ReminderPolicy {
    /// How long before the task the reminder fires.
    pub fn advance_offset(&self, prefs: &NotificationPrefs) -> Duration {
        match (prefs.notify_in_advance, prefs.time_unit) {
            (Some(n), NotificationTimeUnit::Hours) if n > 0 => Duration::hours(n as i64),
            (Some(n), NotificationTimeUnit::Minutes) if n > 0 => Duration::minutes(n as i64),
            _ => Duration::minutes(self.default_advance_minutes as i64),
        }
    }

    fn plan(&self, task: &Task, key: ScheduleKey, occurrence: NaiveDate) -> Option<ReminderPlan> {
        let time = task.time?;
        Some(ReminderPlan {
            key,
            occurrence,
            fire_at: occurrence.and_time(time) - self.advance_offset(&task.notifications),
            title: reminder_title(&task.notifications),
            body: task.title.clone(),
            actions: reminder_actions(&task.notifications),
        })
    }

    /// Reminder for a one-time task, if one is still due after `now`.
    ///
    /// Needs `notify_before`, a time of day and an open task; the fire time
    /// must be strictly in the future.
    pub fn plan_one_time(&self, task: &Task, now: NaiveDateTime) -> Option<ReminderPlan> {
        let TaskKind::OneTime(one_time) = &task.kind else {
            return None;
        };
        if !task.notifications.notify_before || one_time.is_completed {
            return None;
        }
        let key = ScheduleKey {
            task_id: task.id,
            occurrence: None,
        };
        self.plan(task, key, one_time.date)
            .filter(|plan| plan.fire_at > now)
    }

    /// Reminder for the next routine occurrence from today on.
    pub fn plan_routine(&self, task: &Task, now: NaiveDateTime) -> Option<ReminderPlan> {
        self.plan_routine_from(task, now, now.date())
    }

    /// Reminder for the next routine occurrence on or after `from` whose
    /// fire time is still ahead of `now` and that is not completed yet.
    pub fn plan_routine_from(
        &self,
        task: &Task,
        now: NaiveDateTime,
        from: NaiveDate,
    ) -> Option<ReminderPlan> {
        if !task.is_routine() || !task.notifications.notify_before || task.time.is_none() {
            return None;
        }
        let last = now.date() + Duration::days(MAX_SCAN_DAYS);
        let mut cursor = from;
        while cursor <= last {
            let occurrence =
                recurrence::next_occurrence(task, cursor, (last - cursor).num_days())?;
            let key = ScheduleKey {
                task_id: task.id,
                occurrence: Some(occurrence),
            };
            if let Some(plan) = self.plan(task, key, occurrence) {
                if plan.fire_at > now && !recurrence::is_task_completed_for_date(task, occurrence)
                {
                    return Some(plan);
                }
            }
            cursor = occurrence.succ_opt()?;
        }
        None
    }

    pub fn plan_task(&self, task: &Task, now: NaiveDateTime) -> Option<ReminderPlan> {
        match task.kind {
            TaskKind::OneTime(_) => self.plan_one_time(task, now),
            TaskKind::Routine(_) => self.plan_routine(task, now),
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

struct Inner {
    transport: Arc<dyn NotificationTransport>,
    policy: ReminderPolicy,
    timezone: Tz,
    user_id: String,
    running: AtomicBool,
    tasks: Mutex<Vec<Task>>,
    timers: Mutex<HashMap<ScheduleKey, JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn can_deliver(&self) -> bool {
        self.transport.is_supported() && self.transport.permission() == Permission::Granted
    }

    fn local_now(&self) -> NaiveDateTime {
        timezone::local_now(self.timezone, Utc::now())
    }

    fn arm(self: &Arc<Self>, task: Task, plan: ReminderPlan) {
        let fire_at = timezone::resolve_local(self.timezone, plan.fire_at);
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        debug!(key = %plan.key, fire_at = %plan.fire_at, "arming reminder");

        let key = plan.key.clone();
        let weak: Weak<Inner> = Arc::downgrade(self);
        // Held across the spawn so a zero-delay timer cannot remove its key
        // before it is inserted.
        let mut timers = lock(&self.timers);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(task, plan).await;
            }
        });
        if let Some(previous) = timers.insert(key, handle) {
            previous.abort();
        }
    }

    async fn fire(self: Arc<Self>, task: Task, plan: ReminderPlan) {
        lock(&self.timers).remove(&plan.key);

        if self.running.load(Ordering::SeqCst)
            && self.can_deliver()
            && !recurrence::is_task_completed_for_date(&task, plan.occurrence)
        {
            let options = DeliveryOptions {
                kind: NotificationKind::Task,
                related_id: Some(task.id),
                tag: Some(format!("task-{}-{}", task.id, format_iso_date(plan.occurrence))),
                actions: plan.actions.clone(),
            };
            if let Err(e) = self
                .transport
                .push(&self.user_id, &plan.title, &plan.body, &options)
                .await
            {
                warn!(task_id = %task.id, error = %e, "push failed, showing locally");
                if let Err(e) = self.transport.show(&plan.title, &plan.body, &options).await {
                    warn!(task_id = %task.id, error = %e, "reminder could not be delivered");
                }
            }
        }

        if task.is_routine() && self.running.load(Ordering::SeqCst) {
            let next_from = plan.occurrence + Duration::days(1);
            if let Some(next) = self.policy.plan_routine_from(&task, self.local_now(), next_from) {
                self.arm(task, next);
            }
        }
    }
}

/// Owns the reminder timers of one user.
///
/// Timers are tokio tasks; every method that arms them must run inside a
/// tokio runtime. Dropping the scheduler leaves armed timers inert.
#[derive(Clone)]
pub struct NotificationScheduler {
    inner: Arc<Inner>,
}

impl NotificationScheduler {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        policy: ReminderPolicy,
        timezone: Tz,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                policy,
                timezone,
                user_id: user_id.into(),
                running: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
                timers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.inner.policy
    }

    pub fn is_supported(&self) -> bool {
        self.inner.transport.is_supported()
    }

    pub fn permission(&self) -> Permission {
        self.inner.transport.permission()
    }

    /// Asks the transport for permission and re-plans if it was granted.
    pub async fn request_permission(&self) -> Permission {
        let permission = self.inner.transport.request_permission().await;
        if permission == Permission::Granted {
            self.reschedule();
        }
        permission
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Starts arming timers for the known tasks.
    pub fn start(&self) {
        if !self.inner.running.swap(true, Ordering::SeqCst) {
            info!("notification scheduler started");
            self.reschedule();
        }
    }

    /// Cancels every timer; tasks are kept for a later [`Self::start`].
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            self.clear_all();
            info!("notification scheduler stopped");
        }
    }

    /// Replaces the task set, cancelling all timers and re-planning.
    pub fn update_tasks(&self, tasks: Vec<Task>) {
        *lock(&self.inner.tasks) = tasks;
        self.reschedule();
    }

    fn reschedule(&self) {
        self.clear_all();
        if !self.is_running() {
            return;
        }
        if !self.inner.can_deliver() {
            debug!(permission = %self.permission(), "reminders not permitted, nothing armed");
            return;
        }

        let now = self.inner.local_now();
        let tasks = lock(&self.inner.tasks).clone();
        for task in tasks {
            if let Some(plan) = self.inner.policy.plan_task(&task, now) {
                self.inner.arm(task, plan);
            }
        }
    }

    /// Cancels the timers of one task, occurrence timers included.
    pub fn cancel_task(&self, task_id: Uuid) {
        let mut timers = lock(&self.inner.timers);
        timers.retain(|key, handle| {
            if key.task_id == task_id {
                handle.abort();
                false
            } else {
                true
            }
        });
        drop(timers);
        lock(&self.inner.tasks).retain(|task| task.id != task_id);
    }

    pub fn clear_all(&self) {
        for (_, handle) in lock(&self.inner.timers).drain() {
            handle.abort();
        }
    }

    /// Keys of the armed timers.
    pub fn scheduled(&self) -> Vec<ScheduleKey> {
        lock(&self.inner.timers).keys().cloned().collect()
    }
}
