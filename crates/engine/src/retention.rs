//! Periodic purge of old notifications.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use herald_common::error::AppError;

use crate::store::NotificationStore;

pub struct RetentionSweeper {
    store: Arc<dyn NotificationStore>,
    retention_days: u32,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn NotificationStore>, retention_days: u32, interval: Duration) -> Self {
        Self {
            store,
            retention_days,
            interval,
        }
    }

    pub async fn sweep_once(&self) -> Result<u64, AppError> {
        let purged = self.store.purge_older_than(self.retention_days).await?;
        if purged > 0 {
            tracing::info!(purged, retention_days = self.retention_days, "Purged old notifications");
        }
        Ok(purged)
    }

    /// Sweep forever. Failures are logged and the next tick tries again.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                tracing::error!(error = %e, "Retention sweep failed");
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tracing::info!(
            retention_days = self.retention_days,
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    use herald_common::types::{Notification, NotificationContent};

    use crate::memory::InMemoryNotificationStore;

    #[tokio::test]
    async fn test_sweep_once_purges_expired() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let content: NotificationContent =
            serde_json::from_value(serde_json::json!({ "title": "t", "body": "b" })).unwrap();
        let user = Uuid::new_v4();
        store
            .create_batch(&[
                Notification::new(user, &content, Utc::now() - ChronoDuration::days(90)),
                Notification::new(user, &content, Utc::now()),
            ])
            .await
            .unwrap();

        let sweeper = RetentionSweeper::new(store.clone(), 30, Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }
}
