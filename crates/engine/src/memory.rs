//! In-process notification store for tests and local runs without PostgreSQL.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, PageRequest};

use crate::store::NotificationStore;

/// Vec-backed store. Payloads are kept as serialized text, like the SQL store,
/// so round-trips go through the same serde path.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<Vec<(Notification, String)>>,
    unavailable: AtomicBool,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail as if the database were down. Reads keep working.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("notification store unavailable".to_string()));
        }
        Ok(())
    }

    fn encode(notification: &Notification) -> Result<(Notification, String), AppError> {
        let data = serde_json::to_string(&notification.data)?;
        Ok((notification.clone(), data))
    }

    fn decode((notification, data): &(Notification, String)) -> Result<Notification, AppError> {
        let mut n = notification.clone();
        n.data = serde_json::from_str(data)?;
        Ok(n)
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, notification: &Notification) -> Result<Uuid, AppError> {
        self.check_available()?;
        let row = Self::encode(notification)?;
        self.rows.write().await.push(row);
        Ok(notification.id)
    }

    async fn create_batch(&self, notifications: &[Notification]) -> Result<(), AppError> {
        self.check_available()?;
        let encoded = notifications
            .iter()
            .map(Self::encode)
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.write().await.extend(encoded);
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, i64), AppError> {
        let rows = self.rows.read().await;
        let mut owned: Vec<&(Notification, String)> =
            rows.iter().filter(|(n, _)| n.user_id == user_id).collect();
        owned.sort_by(|(a, _), (b, _)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = owned.len() as i64;
        let items = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(Self::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|(n, _)| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool, AppError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        match rows
            .iter_mut()
            .find(|(n, _)| n.id == notification_id && n.user_id == user_id && !n.is_read)
        {
            Some((n, _)) => {
                n.is_read = true;
                n.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for (n, _) in rows.iter_mut() {
            if n.user_id == user_id && !n.is_read {
                n.is_read = true;
                n.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn purge_older_than(&self, days: u32) -> Result<u64, AppError> {
        self.check_available()?;
        let Some(cutoff) = Utc::now().checked_sub_signed(Duration::days(days as i64)) else {
            return Ok(0);
        };
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(n, _)| n.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}
