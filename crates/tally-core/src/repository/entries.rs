use crate::calendar::format_iso_date;
use crate::error::CoreError;
use crate::models::{CounterEntry, NewCounterEntry};
use crate::repository::SqliteRepository;
use crate::reset::ResetStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

#[async_trait]
impl super::CounterEntryRepository for SqliteRepository {
    async fn add_counter_entry(&self, entry: NewCounterEntry) -> Result<CounterEntry, CoreError> {
        let counter_id = entry.counter_id;
        let date = entry.date;
        self.upsert_entry(entry).await?.ok_or_else(|| {
            CoreError::Conflict(format!(
                "counter {counter_id} is already archived for {date}"
            ))
        })
    }

    async fn find_entries_for_counter(
        &self,
        counter_id: Uuid,
        user_id: &str,
    ) -> Result<Vec<CounterEntry>, CoreError> {
        let entries = sqlx::query_as(
            "SELECT * FROM counter_entries WHERE counter_id = $1 AND user_id = $2 ORDER BY date DESC, timestamp DESC",
        )
        .bind(counter_id)
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(entries)
    }

    async fn find_entries_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CounterEntry>, CoreError> {
        if end < start {
            return Err(CoreError::InvalidInput(
                "Range end cannot be before its start".to_string(),
            ));
        }
        let entries = sqlx::query_as(
            "SELECT * FROM counter_entries WHERE user_id = $1 AND date >= $2 AND date <= $3 ORDER BY date DESC, timestamp DESC",
        )
        .bind(user_id)
        .bind(format_iso_date(start))
        .bind(format_iso_date(end))
        .fetch_all(self.pool())
        .await?;
        Ok(entries)
    }

    async fn delete_entries_before(
        &self,
        user_id: &str,
        before: NaiveDate,
    ) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM counter_entries WHERE user_id = $1 AND date < $2")
            .bind(user_id)
            .bind(format_iso_date(before))
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
