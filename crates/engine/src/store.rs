//! Notification persistence.
//!
//! Rows are append-only apart from the `is_read` flag, which only ever moves
//! from false to true. Every mutation is scoped to the owning user, so a
//! foreign notification id is indistinguishable from a missing one.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationRow, PageRequest};

/// Durable record of notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert one notification.
    async fn create(&self, notification: &Notification) -> Result<Uuid, AppError>;

    /// Insert many notifications in one statement. A failure covers the whole batch.
    async fn create_batch(&self, notifications: &[Notification]) -> Result<(), AppError>;

    /// Newest first. Returns the page and the user's total notification count.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, i64), AppError>;

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError>;

    /// Returns `true` if the notification transitioned to read.
    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, AppError>;

    /// Returns the number of notifications that transitioned to read.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Delete notifications created more than `days` days ago.
    async fn purge_older_than(&self, days: u32) -> Result<u64, AppError>;
}

/// `make_interval` takes an `int4`; larger retention values are refused
/// rather than wrapped into a negative interval.
fn interval_days(days: u32) -> Result<i32, AppError> {
    i32::try_from(days)
        .map_err(|_| AppError::Config(format!("retention of {} days is out of range", days)))
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<Uuid, AppError> {
        let data = serde_json::to_string(&notification.data)?;

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, title, body, notification_type, image_url, data, is_read, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.notification_type)
        .bind(&notification.image_url)
        .bind(data)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(notification.id)
    }

    async fn create_batch(&self, notifications: &[Notification]) -> Result<(), AppError> {
        if notifications.is_empty() {
            return Ok(());
        }

        let len = notifications.len();
        let mut ids = Vec::with_capacity(len);
        let mut user_ids = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut bodies = Vec::with_capacity(len);
        let mut types = Vec::with_capacity(len);
        let mut images: Vec<Option<String>> = Vec::with_capacity(len);
        let mut payloads = Vec::with_capacity(len);
        let mut read_flags = Vec::with_capacity(len);
        let mut created = Vec::with_capacity(len);
        let mut updated = Vec::with_capacity(len);

        for n in notifications {
            ids.push(n.id);
            user_ids.push(n.user_id);
            titles.push(n.title.clone());
            bodies.push(n.body.clone());
            types.push(n.notification_type.clone());
            images.push(n.image_url.clone());
            payloads.push(serde_json::to_string(&n.data)?);
            read_flags.push(n.is_read);
            created.push(n.created_at);
            updated.push(n.updated_at);
        }

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, user_id, title, body, notification_type, image_url, data, is_read, created_at, updated_at)
            SELECT * FROM UNNEST(
                $1::uuid[], $2::uuid[], $3::text[], $4::text[], $5::text[],
                $6::text[], $7::text[], $8::bool[], $9::timestamptz[], $10::timestamptz[]
            )
            "#,
        )
        .bind(ids)
        .bind(user_ids)
        .bind(titles)
        .bind(bodies)
        .bind(types)
        .bind(images)
        .bind(payloads)
        .bind(read_flags)
        .bind(created)
        .bind(updated)
        .execute(&self.pool)
        .await?;

        tracing::debug!(count = len, "Notification batch persisted");
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, title, body, notification_type, image_url, data, is_read, created_at, updated_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit as i64)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Notification::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_read = false
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, updated_at = NOW()
            WHERE user_id = $1 AND is_read = false
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_older_than(&self, days: u32) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE created_at < NOW() - make_interval(days => $1)",
        )
        .bind(interval_days(days)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_days_never_wraps() {
        assert_eq!(interval_days(30).unwrap(), 30);
        assert_eq!(interval_days(i32::MAX as u32).unwrap(), i32::MAX);
        assert!(matches!(interval_days(u32::MAX), Err(AppError::Config(_))));
        assert!(matches!(interval_days(1 << 31), Err(AppError::Config(_))));
    }
}
