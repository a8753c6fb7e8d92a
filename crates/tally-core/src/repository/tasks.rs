use crate::calendar::{self, format_iso_date, parse_iso_date};
use crate::error::CoreError;
use crate::models::{
    CompletionResult, NewTaskData, NewTaskKind, NotificationPrefs, NotificationTimeUnit,
    OneTimeTask, Recurrence, RoutineTask, Task, TaskKind, TimeUnit,
};
use crate::recurrence;
use crate::repository::{short_id_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use uuid::Uuid;

const TIME_FORMAT: &str = "%H:%M";

/// Raw `tasks` row. Dates stay as text until [`TaskRow::into_task`] so a
/// corrupt value only costs its own row.
#[derive(Debug, FromRow)]
pub(crate) struct TaskRow {
    id: Uuid,
    user_id: String,
    title: String,
    description: Option<String>,
    task_type: String,
    time: Option<String>,
    date: Option<String>,
    is_completed: bool,
    weekdays: Option<String>,
    month_day: Option<i64>,
    recurrence_interval: Option<i64>,
    recurrence_unit: Option<TimeUnit>,
    start_date: Option<String>,
    end_date: Option<String>,
    notify_before: bool,
    notify_in_advance: Option<i64>,
    notify_time_unit: String,
    collect_feedback: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DateRow {
    task_id: Uuid,
    date: String,
}

fn parse_stored_date(field: &str, value: &str) -> Result<NaiveDate, CoreError> {
    parse_iso_date(value)
        .ok_or_else(|| CoreError::InvalidDate(format!("{field}: '{value}'")))
}

fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, CoreError> {
    value.map(|v| parse_stored_date(field, v)).transpose()
}

impl TaskRow {
    fn into_task(
        self,
        completed_dates: BTreeSet<NaiveDate>,
        excluded_dates: BTreeSet<NaiveDate>,
    ) -> Result<Task, CoreError> {
        let time = self
            .time
            .as_deref()
            .map(|t| {
                NaiveTime::parse_from_str(t, TIME_FORMAT)
                    .map_err(|_| CoreError::InvalidDate(format!("time: '{t}'")))
            })
            .transpose()?;

        let kind = match self.task_type.as_str() {
            "onetime" => {
                let raw = self
                    .date
                    .as_deref()
                    .ok_or_else(|| CoreError::InvalidDate("date: missing".to_string()))?;
                TaskKind::OneTime(OneTimeTask {
                    date: parse_stored_date("date", raw)?,
                    is_completed: self.is_completed,
                })
            }
            "routine" => {
                let weekdays = match self.weekdays.as_deref() {
                    Some(json) => {
                        let names: Vec<String> = serde_json::from_str(json).map_err(|e| {
                            CoreError::InvalidInput(format!("weekdays: {e}"))
                        })?;
                        names
                            .iter()
                            .filter_map(|name| calendar::parse_weekday(name))
                            .collect()
                    }
                    None => Default::default(),
                };
                let recurrence = match (self.recurrence_interval, self.recurrence_unit) {
                    (Some(interval), Some(unit)) if interval >= 1 => Some(Recurrence {
                        interval: interval as u32,
                        unit,
                    }),
                    _ => None,
                };
                TaskKind::Routine(RoutineTask {
                    weekdays,
                    month_day: self.month_day.map(|d| d as u32),
                    recurrence,
                    start_date: parse_optional_date("start_date", self.start_date.as_deref())?,
                    end_date: parse_optional_date("end_date", self.end_date.as_deref())?,
                    completed_dates,
                    excluded_dates,
                })
            }
            other => {
                return Err(CoreError::InvalidInput(format!("unknown task type '{other}'")));
            }
        };

        let time_unit: NotificationTimeUnit = self
            .notify_time_unit
            .parse()
            .map_err(|e| CoreError::InvalidInput(format!("notify_time_unit: {e}")))?;

        Ok(Task {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            time,
            kind,
            notifications: NotificationPrefs {
                notify_before: self.notify_before,
                notify_in_advance: self.notify_in_advance.map(|n| n.max(0) as u32),
                time_unit,
                collect_feedback: self.collect_feedback,
            },
            created_at: self.created_at,
        })
    }
}

fn group_dates(rows: Vec<DateRow>, table: &str) -> HashMap<Uuid, BTreeSet<NaiveDate>> {
    let mut grouped: HashMap<Uuid, BTreeSet<NaiveDate>> = HashMap::new();
    for row in rows {
        match parse_iso_date(&row.date) {
            Some(date) => {
                grouped.entry(row.task_id).or_default().insert(date);
            }
            None => warn!(task_id = %row.task_id, date = %row.date, table, "skipping corrupt date"),
        }
    }
    grouped
}

/// Assembles tasks from rows, dropping the ones that cannot be decoded.
fn assemble(
    rows: Vec<TaskRow>,
    mut completions: HashMap<Uuid, BTreeSet<NaiveDate>>,
    mut exclusions: HashMap<Uuid, BTreeSet<NaiveDate>>,
) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            let completed = completions.remove(&id).unwrap_or_default();
            let excluded = exclusions.remove(&id).unwrap_or_default();
            match row.into_task(completed, excluded) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(task_id = %id, error = %e, "skipping unreadable task");
                    None
                }
            }
        })
        .collect()
}

fn validate_new_task(data: &NewTaskData) -> Result<(), CoreError> {
    if data.title.trim().is_empty() {
        return Err(CoreError::InvalidInput("Task title cannot be empty".to_string()));
    }
    if let NewTaskKind::Routine(routine) = &data.kind {
        if let Some(day) = routine.month_day {
            if !(1..=31).contains(&day) {
                return Err(CoreError::InvalidInput(format!(
                    "Day of month must be between 1 and 31, got {day}"
                )));
            }
        }
        if let Some(recurrence) = routine.recurrence {
            if recurrence.interval == 0 {
                return Err(CoreError::InvalidInput(
                    "Recurrence interval must be at least 1".to_string(),
                ));
            }
        }
        if let (Some(start), Some(end)) = (routine.start_date, routine.end_date) {
            if end < start {
                return Err(CoreError::InvalidInput(
                    "End date cannot be before start date".to_string(),
                ));
            }
        }
    }
    Ok(())
}

impl SqliteRepository {
    async fn load_task(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Task>, CoreError> {
        let Some(row): Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let completions: Vec<DateRow> =
            sqlx::query_as("SELECT task_id, date FROM task_completions WHERE task_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;
        let exclusions: Vec<DateRow> =
            sqlx::query_as("SELECT task_id, date FROM task_exclusions WHERE task_id = $1")
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;

        let completed = group_dates(completions, "task_completions")
            .remove(&id)
            .unwrap_or_default();
        let excluded = group_dates(exclusions, "task_exclusions")
            .remove(&id)
            .unwrap_or_default();
        row.into_task(completed, excluded).map(Some)
    }

    async fn fetch_tasks_where(
        &self,
        condition: &str,
        user_id: &str,
        extra: Option<String>,
    ) -> Result<Vec<Task>, CoreError> {
        let mut conn = self.pool().acquire().await?;

        let sql = format!("SELECT * FROM tasks WHERE {condition} ORDER BY created_at");
        let mut query = sqlx::query_as::<_, TaskRow>(&sql).bind(user_id);
        if let Some(extra) = &extra {
            query = query.bind(extra);
        }
        let rows = query.fetch_all(&mut *conn).await?;

        let completions: Vec<DateRow> = sqlx::query_as(
            "SELECT c.task_id, c.date FROM task_completions c JOIN tasks t ON t.id = c.task_id WHERE t.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        let exclusions: Vec<DateRow> = sqlx::query_as(
            "SELECT e.task_id, e.date FROM task_exclusions e JOIN tasks t ON t.id = e.task_id WHERE t.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(assemble(
            rows,
            group_dates(completions, "task_completions"),
            group_dates(exclusions, "task_exclusions"),
        ))
    }
}

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, user_id: &str, data: NewTaskData) -> Result<Task, CoreError> {
        validate_new_task(&data)?;

        let now = Utc::now();
        let kind = match data.kind {
            NewTaskKind::OneTime { date } => TaskKind::OneTime(OneTimeTask {
                date,
                is_completed: false,
            }),
            NewTaskKind::Routine(routine) => TaskKind::Routine(RoutineTask {
                weekdays: routine.weekdays.into_iter().collect(),
                month_day: routine.month_day,
                recurrence: routine.recurrence,
                start_date: routine.start_date,
                end_date: routine.end_date,
                completed_dates: BTreeSet::new(),
                excluded_dates: BTreeSet::new(),
            }),
        };
        let task = Task {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: data.title.trim().to_string(),
            description: data.description,
            time: data.time,
            kind,
            notifications: data.notifications,
            created_at: now,
        };

        let (task_type, date, weekdays, month_day, interval, unit, start_date, end_date) =
            match &task.kind {
                TaskKind::OneTime(one_time) => (
                    "onetime",
                    Some(format_iso_date(one_time.date)),
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                ),
                TaskKind::Routine(routine) => {
                    let mut names: Vec<_> = routine.weekdays.iter().copied().collect();
                    names.sort_by_key(|w| w.num_days_from_monday());
                    let names: Vec<&str> =
                        names.into_iter().map(calendar::weekday_name).collect();
                    let weekdays = if names.is_empty() {
                        None
                    } else {
                        Some(serde_json::to_string(&names).map_err(|e| {
                            CoreError::InvalidInput(format!("weekdays: {e}"))
                        })?)
                    };
                    (
                        "routine",
                        None,
                        weekdays,
                        routine.month_day.map(i64::from),
                        routine.recurrence.map(|r| i64::from(r.interval)),
                        routine.recurrence.map(|r| r.unit),
                        routine.start_date.map(format_iso_date),
                        routine.end_date.map(format_iso_date),
                    )
                }
            };

        sqlx::query(
            r#"INSERT INTO tasks (id, user_id, title, description, task_type, time, date, is_completed,
                weekdays, month_day, recurrence_interval, recurrence_unit, start_date, end_date,
                notify_before, notify_in_advance, notify_time_unit, collect_feedback, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            "#,
        )
        .bind(task.id)
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task_type)
        .bind(task.time.map(|t| t.format(TIME_FORMAT).to_string()))
        .bind(date)
        .bind(weekdays)
        .bind(month_day)
        .bind(interval)
        .bind(unit)
        .bind(start_date)
        .bind(end_date)
        .bind(task.notifications.notify_before)
        .bind(task.notifications.notify_in_advance.map(i64::from))
        .bind(task.notifications.time_unit)
        .bind(task.notifications.collect_feedback)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        Self::load_task(&mut *conn, id).await
    }

    async fn find_tasks_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Task>, CoreError> {
        let pattern = short_id_pattern(short_id)?;
        self.fetch_tasks_where("user_id = $1 AND lower(hex(id)) LIKE $2", user_id, Some(pattern))
            .await
    }

    async fn find_tasks(&self, user_id: &str) -> Result<Vec<Task>, CoreError> {
        self.fetch_tasks_where("user_id = $1", user_id, None).await
    }

    async fn toggle_task_completion(
        &self,
        id: Uuid,
        date: NaiveDate,
    ) -> Result<(Task, CompletionResult), CoreError> {
        let mut tx = self.pool().begin().await?;

        let mut task = Self::load_task(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let result = recurrence::toggle_completion(&mut task, date);

        match &task.kind {
            TaskKind::OneTime(one_time) => {
                sqlx::query("UPDATE tasks SET is_completed = $1, updated_at = $2 WHERE id = $3")
                    .bind(one_time.is_completed)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            TaskKind::Routine(_) => {
                let sql = match result {
                    CompletionResult::Completed => {
                        "INSERT OR IGNORE INTO task_completions (task_id, date) VALUES ($1, $2)"
                    }
                    CompletionResult::Reopened => {
                        "DELETE FROM task_completions WHERE task_id = $1 AND date = $2"
                    }
                };
                sqlx::query(sql)
                    .bind(id)
                    .bind(format_iso_date(date))
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok((task, result))
    }

    async fn exclude_occurrence(&self, id: Uuid, date: NaiveDate) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;

        let mut task = Self::load_task(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        let TaskKind::Routine(routine) = &mut task.kind else {
            return Err(CoreError::InvalidInput(
                "Only routine tasks have occurrences to remove".to_string(),
            ));
        };

        sqlx::query("INSERT OR IGNORE INTO task_exclusions (task_id, date) VALUES ($1, $2)")
            .bind(id)
            .bind(format_iso_date(date))
            .execute(&mut *tx)
            .await?;
        routine.excluded_dates.insert(date);

        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_all_tasks(&self, user_id: &str) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
