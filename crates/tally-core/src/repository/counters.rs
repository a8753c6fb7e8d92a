use crate::calendar::{format_iso_date, parse_iso_date};
use crate::error::CoreError;
use crate::models::{Counter, CounterEntry, CounterKind, NewCounterData, NewCounterEntry};
use crate::repository::{short_id_pattern, SqliteRepository};
use crate::reset::ResetStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(crate) struct CounterRow {
    id: Uuid,
    user_id: String,
    name: String,
    description: Option<String>,
    counter_type: CounterKind,
    start_date: Option<String>,
    end_date: Option<String>,
    current_value: i64,
    goal: Option<i64>,
    last_reset_date: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decode_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, CoreError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_iso_date(&raw)
            .map(Some)
            .ok_or_else(|| CoreError::InvalidDate(format!("{field}: '{raw}'"))),
    }
}

impl TryFrom<CounterRow> for Counter {
    type Error = CoreError;

    fn try_from(row: CounterRow) -> Result<Self, Self::Error> {
        Ok(Counter {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            kind: row.counter_type,
            start_date: decode_date("start_date", row.start_date)?,
            end_date: decode_date("end_date", row.end_date)?,
            current_value: row.current_value.clamp(0, u32::MAX as i64) as u32,
            goal: row.goal.map(|g| g.clamp(0, u32::MAX as i64) as u32),
            last_reset_date: decode_date("last_reset_date", row.last_reset_date)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts rows, dropping the ones with unreadable dates.
fn readable(rows: Vec<CounterRow>) -> Vec<Counter> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            Counter::try_from(row)
                .map_err(|e| warn!(counter_id = %id, error = %e, "skipping unreadable counter"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl super::CounterRepository for SqliteRepository {
    async fn add_counter(&self, user_id: &str, data: NewCounterData) -> Result<Counter, CoreError> {
        if data.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("Counter name cannot be empty".to_string()));
        }
        if data.end_date.is_some_and(|end| end < data.start_date) {
            return Err(CoreError::InvalidInput(
                "End date cannot be before start date".to_string(),
            ));
        }

        let now = Utc::now();
        let counter = Counter {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: data.name.trim().to_string(),
            description: data.description,
            kind: data.kind,
            start_date: Some(data.start_date),
            end_date: data.end_date,
            current_value: 0,
            goal: data.goal,
            last_reset_date: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO counters (id, user_id, name, description, counter_type, start_date, end_date, current_value, goal, last_reset_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, NULL, $9, $9)
            "#,
        )
        .bind(counter.id)
        .bind(&counter.user_id)
        .bind(&counter.name)
        .bind(&counter.description)
        .bind(counter.kind)
        .bind(counter.start_date.map(format_iso_date))
        .bind(counter.end_date.map(format_iso_date))
        .bind(counter.goal.map(i64::from))
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(counter)
    }

    async fn find_counter_by_id(&self, id: Uuid) -> Result<Option<Counter>, CoreError> {
        let row: Option<CounterRow> = sqlx::query_as("SELECT * FROM counters WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Counter::try_from).transpose()
    }

    async fn find_counters_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Counter>, CoreError> {
        let pattern = short_id_pattern(short_id)?;
        let rows: Vec<CounterRow> = sqlx::query_as(
            "SELECT * FROM counters WHERE user_id = $1 AND lower(hex(id)) LIKE $2 ORDER BY created_at",
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        Ok(readable(rows))
    }

    async fn find_counters(&self, user_id: &str) -> Result<Vec<Counter>, CoreError> {
        let rows: Vec<CounterRow> =
            sqlx::query_as("SELECT * FROM counters WHERE user_id = $1 ORDER BY created_at")
                .bind(user_id)
                .fetch_all(self.pool())
                .await?;
        Ok(readable(rows))
    }

    async fn increment_counter(&self, id: Uuid) -> Result<Counter, CoreError> {
        let row: Option<CounterRow> = sqlx::query_as(
            "UPDATE counters SET current_value = current_value + 1, updated_at = $1 WHERE id = $2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| CoreError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn decrement_counter(&self, id: Uuid) -> Result<Counter, CoreError> {
        let row: Option<CounterRow> = sqlx::query_as(
            "UPDATE counters SET current_value = current_value - 1, updated_at = $1 WHERE id = $2 AND current_value > 0 RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => row.try_into(),
            // Already at zero, or gone
            None => self
                .find_counter_by_id(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(id.to_string())),
        }
    }

    async fn delete_counter(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM counters WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_all_counters(&self, user_id: &str) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM counters WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ResetStore for SqliteRepository {
    async fn find_entry_for_date(
        &self,
        counter_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CounterEntry>, CoreError> {
        let entry = sqlx::query_as(
            "SELECT * FROM counter_entries WHERE counter_id = $1 AND date = $2 AND source = 'reset'",
        )
        .bind(counter_id)
        .bind(format_iso_date(date))
        .fetch_optional(self.pool())
        .await?;
        Ok(entry)
    }

    async fn upsert_entry(&self, entry: NewCounterEntry) -> Result<Option<CounterEntry>, CoreError> {
        let stored: Option<CounterEntry> = sqlx::query_as(
            r#"INSERT INTO counter_entries (id, counter_id, user_id, name, value, date, source, timestamp, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (counter_id, date) DO UPDATE SET
                name = excluded.name,
                value = excluded.value,
                source = excluded.source,
                timestamp = excluded.timestamp,
                note = COALESCE(excluded.note, counter_entries.note)
            WHERE counter_entries.source = 'manual'
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(entry.counter_id)
        .bind(&entry.user_id)
        .bind(&entry.name)
        .bind(i64::from(entry.value))
        .bind(format_iso_date(entry.date))
        .bind(entry.source)
        .bind(Utc::now())
        .bind(&entry.note)
        .fetch_optional(self.pool())
        .await?;

        if stored.is_none() {
            debug!(counter_id = %entry.counter_id, date = %entry.date, "entry already archived");
        }
        Ok(stored)
    }

    async fn commit_reset(
        &self,
        counter_id: Uuid,
        expected_last_reset: Option<NaiveDate>,
        today: NaiveDate,
        archived_value: u32,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"UPDATE counters
            SET current_value = MAX(current_value - $1, 0), last_reset_date = $2, updated_at = $3
            WHERE id = $4 AND last_reset_date IS $5
            "#,
        )
        .bind(i64::from(archived_value))
        .bind(format_iso_date(today))
        .bind(Utc::now())
        .bind(counter_id)
        .bind(expected_last_reset.map(format_iso_date))
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
