use crate::error::CoreError;
use crate::models::{NewNotification, Notification};
use crate::repository::{short_id_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
impl super::NotificationRepository for SqliteRepository {
    async fn add_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<Notification, CoreError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: notification.title,
            message: notification.message,
            timestamp: Utc::now(),
            read: false,
            kind: notification.kind,
            related_id: notification.related_id,
        };

        sqlx::query(
            r#"INSERT INTO notifications (id, user_id, title, message, timestamp, read, kind, related_id)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.timestamp)
        .bind(notification.kind)
        .bind(notification.related_id)
        .execute(self.pool())
        .await?;

        Ok(notification)
    }

    async fn find_notifications(&self, user_id: &str) -> Result<Vec<Notification>, CoreError> {
        let notifications = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(notifications)
    }

    async fn find_notifications_by_short_id_prefix(
        &self,
        user_id: &str,
        short_id: &str,
    ) -> Result<Vec<Notification>, CoreError> {
        let pattern = short_id_pattern(short_id)?;
        let notifications = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 AND lower(hex(id)) LIKE $2 ORDER BY timestamp DESC",
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        Ok(notifications)
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64, CoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn mark_notification_read(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, CoreError> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
                .bind(user_id)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_all_notifications(&self, user_id: &str) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notifications_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1 AND timestamp < $2")
            .bind(user_id)
            .bind(before)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
