//! Read-side operations exposed to authenticated users.

use std::sync::Arc;

use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{NotificationPage, PageRequest};

use crate::presence::{Presence, PresenceSlot};
use crate::store::NotificationStore;

/// Listing, counting and read-marking of a user's own notifications.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    presence: PresenceSlot,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, presence: PresenceSlot) -> Self {
        Self { store, presence }
    }

    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<NotificationPage, AppError> {
        let (notifications, total) = self.store.list_by_user(user_id, page).await?;
        let unread_count = self.store.count_unread(user_id).await?;

        Ok(NotificationPage {
            notifications,
            total,
            page: page.page,
            limit: page.limit,
            unread_count,
        })
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, AppError> {
        self.store.count_unread(user_id).await
    }

    /// Foreign, unknown and already-read ids are all silent no-ops.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<(), AppError> {
        if self.store.mark_read(user_id, notification_id).await? {
            self.refresh_badge(user_id).await;
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let changed = self.store.mark_all_read(user_id).await?;
        if changed > 0 {
            tracing::debug!(user_id = %user_id, changed, "Marked all notifications read");
            self.refresh_badge(user_id).await;
        }
        Ok(changed)
    }

    /// Push the recomputed unread count to the user's other live sessions.
    async fn refresh_badge(&self, user_id: Uuid) {
        if !self.presence.is_online(user_id).await {
            return;
        }
        match self.store.count_unread(user_id).await {
            Ok(count) => self.presence.send_unread_count(user_id, count).await,
            Err(e) => tracing::debug!(user_id = %user_id, error = %e, "Skipping badge refresh"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use herald_common::types::{Notification, NotificationContent, RealtimeEvent};

    use crate::memory::InMemoryNotificationStore;

    #[derive(Default)]
    struct BadgeRecorder {
        counts: Mutex<Vec<(Uuid, i64)>>,
    }

    #[async_trait]
    impl Presence for BadgeRecorder {
        async fn is_online(&self, _user_id: Uuid) -> bool {
            true
        }
        async fn try_send(&self, _user_id: Uuid, _event: &RealtimeEvent) -> bool {
            true
        }
        async fn send_unread_count(&self, user_id: Uuid, count: i64) {
            self.counts.lock().await.push((user_id, count));
        }
    }

    fn content() -> NotificationContent {
        serde_json::from_value(serde_json::json!({ "title": "t", "body": "b" })).unwrap()
    }

    async fn seeded(user: Uuid, n: usize) -> (Arc<InMemoryNotificationStore>, Vec<Uuid>) {
        let store = Arc::new(InMemoryNotificationStore::new());
        let mut ids = Vec::new();
        for _ in 0..n {
            let notification = Notification::new(user, &content(), Utc::now());
            ids.push(store.create(&notification).await.unwrap());
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_list_reports_totals() {
        let user = Uuid::new_v4();
        let (store, ids) = seeded(user, 3).await;
        store.mark_read(user, ids[0]).await.unwrap();
        let service = NotificationService::new(store, PresenceSlot::new());

        let page = service
            .list_notifications(user, PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();

        assert_eq!(page.notifications.len(), 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.unread_count, 2);
        assert_eq!(page.limit, 2);
    }

    #[tokio::test]
    async fn test_mark_read_twice_is_noop() {
        let user = Uuid::new_v4();
        let (store, ids) = seeded(user, 1).await;
        let slot = PresenceSlot::new();
        let badges = Arc::new(BadgeRecorder::default());
        slot.bind(badges.clone());
        let service = NotificationService::new(store, slot);

        service.mark_read(user, ids[0]).await.unwrap();
        service.mark_read(user, ids[0]).await.unwrap();

        assert_eq!(service.unread_count(user).await.unwrap(), 0);
        assert_eq!(badges.counts.lock().await.as_slice(), &[(user, 0)]);
    }

    #[tokio::test]
    async fn test_mark_read_foreign_id_is_silent() {
        let owner = Uuid::new_v4();
        let (store, ids) = seeded(owner, 1).await;
        let service = NotificationService::new(store, PresenceSlot::new());

        service.mark_read(Uuid::new_v4(), ids[0]).await.unwrap();
        service.mark_read(owner, Uuid::new_v4()).await.unwrap();

        assert_eq!(service.unread_count(owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let user = Uuid::new_v4();
        let (store, _) = seeded(user, 4).await;
        let service = NotificationService::new(store, PresenceSlot::new());

        assert_eq!(service.mark_all_read(user).await.unwrap(), 4);
        assert_eq!(service.mark_all_read(user).await.unwrap(), 0);
        assert_eq!(service.unread_count(user).await.unwrap(), 0);
    }
}
