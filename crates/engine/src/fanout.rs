//! Fanout engine: delivers one event to a recipient set over the fastest
//! available channel.
//!
//! For each dispatch:
//! 1. Build one notification per recipient (same content, distinct ids)
//! 2. Persist the batch; a failure is logged and delivery continues
//! 3. Try every recipient over their realtime connection, concurrently
//! 4. Refresh the unread badge of everyone reached in realtime
//! 5. Send one push multicast covering everyone who was not reached
//!
//! Channel failures never surface to the caller. Real-time success suppresses
//! push for that recipient entirely.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

use herald_common::types::{Notification, NotificationContent, Payload, RealtimeEvent, kind};
use herald_notifier::{PushChannel, PushError, PushMessage, PushOutcome};

use crate::presence::{Presence, PresenceSlot};
use crate::store::NotificationStore;

/// One event addressed to a list of users.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    /// Delivered verbatim: no dedup, no membership re-check.
    pub recipients: Vec<Uuid>,
    pub content: NotificationContent,
}

impl DispatchRequest {
    pub fn new(recipients: Vec<Uuid>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipients,
            content: NotificationContent {
                title: title.into(),
                body: body.into(),
                notification_type: kind::GENERAL.to_string(),
                image_url: None,
                data: Payload::new(),
            },
        }
    }

    pub fn with_kind(mut self, notification_type: impl Into<String>) -> Self {
        self.content.notification_type = notification_type.into();
        self
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.content.image_url = image_url;
        self
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.content.data = data;
        self
    }
}

/// Channel that ended up carrying a notification to one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Realtime,
    Push,
}

/// What happened to one recipient. Logged, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAttempt {
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub channel: DeliveryChannel,
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub recipients: usize,
    pub persisted: bool,
    pub attempts: Vec<DeliveryAttempt>,
    /// `None` when nobody needed push or the push leg failed.
    pub push: Option<PushOutcome>,
}

impl DispatchReport {
    pub fn realtime_users(&self) -> Vec<Uuid> {
        self.users_on(DeliveryChannel::Realtime)
    }

    pub fn push_users(&self) -> Vec<Uuid> {
        self.users_on(DeliveryChannel::Push)
    }

    fn users_on(&self, channel: DeliveryChannel) -> Vec<Uuid> {
        self.attempts
            .iter()
            .filter(|a| a.channel == channel)
            .map(|a| a.user_id)
            .collect()
    }
}

/// Orchestrates persistence, realtime delivery and push fallback.
pub struct FanoutEngine {
    store: Arc<dyn NotificationStore>,
    presence: PresenceSlot,
    push: Arc<dyn PushChannel>,
    permits: Arc<Semaphore>,
}

impl FanoutEngine {
    /// `max_concurrent` bounds how many submitted dispatches run at once.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        presence: PresenceSlot,
        push: Arc<dyn PushChannel>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            presence,
            push,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn presence(&self) -> &PresenceSlot {
        &self.presence
    }

    /// Run a dispatch in the background and return immediately.
    ///
    /// The spawned task is never joined and its failures are terminal: they
    /// are logged and not retried. A process exit mid-dispatch drops any push
    /// still pending.
    pub fn submit(self: &Arc<Self>, request: DispatchRequest) {
        if request.recipients.is_empty() {
            return;
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.dispatch_bounded(request).await;
        });
    }

    /// Like [`dispatch`](Self::dispatch), but waits for a slot in the shared
    /// dispatch pool first. Producers that run their own tasks use this so
    /// every dispatch counts against `max_concurrent`.
    pub async fn dispatch_bounded(&self, request: DispatchRequest) -> DispatchReport {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!("Dispatch pool closed, dropping notification");
                return DispatchReport::default();
            }
        };
        self.dispatch(request).await
    }

    /// Deliver `request` and wait for every channel to finish.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchReport {
        let DispatchRequest {
            recipients,
            content,
        } = request;

        if recipients.is_empty() {
            tracing::debug!("Dispatch with no recipients, nothing to do");
            return DispatchReport::default();
        }

        let now = Utc::now();
        let notifications: Vec<Notification> = recipients
            .iter()
            .map(|user_id| Notification::new(*user_id, &content, now))
            .collect();

        let persisted = match self.store.create_batch(&notifications).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    recipients = recipients.len(),
                    notification_type = %content.notification_type,
                    "Failed to persist notifications, delivering anyway"
                );
                false
            }
        };

        let delivered = join_all(notifications.iter().map(|n| self.deliver_realtime(n))).await;

        let mut attempts = Vec::with_capacity(notifications.len());
        let mut unreached = Vec::new();
        for (notification, realtime) in notifications.iter().zip(delivered) {
            let channel = if realtime {
                DeliveryChannel::Realtime
            } else {
                unreached.push(notification.user_id);
                DeliveryChannel::Push
            };
            tracing::debug!(
                user_id = %notification.user_id,
                notification_id = %notification.id,
                channel = ?channel,
                "Delivery attempt"
            );
            attempts.push(DeliveryAttempt {
                user_id: notification.user_id,
                notification_id: notification.id,
                channel,
            });
        }

        let push = if unreached.is_empty() {
            None
        } else {
            self.push_fallback(&unreached, &content).await
        };

        tracing::info!(
            recipients = recipients.len(),
            realtime = recipients.len() - unreached.len(),
            push = unreached.len(),
            persisted,
            notification_type = %content.notification_type,
            "Dispatch complete"
        );

        DispatchReport {
            recipients: recipients.len(),
            persisted,
            attempts,
            push,
        }
    }

    async fn deliver_realtime(&self, notification: &Notification) -> bool {
        let event = RealtimeEvent::Notification(notification.clone());
        if !self.presence.try_send(notification.user_id, &event).await {
            return false;
        }

        // Fresh count every time; never incremented in place.
        match self.store.count_unread(notification.user_id).await {
            Ok(count) => {
                self.presence
                    .send_unread_count(notification.user_id, count)
                    .await
            }
            Err(e) => tracing::debug!(
                user_id = %notification.user_id,
                error = %e,
                "Skipping unread badge refresh"
            ),
        }
        true
    }

    async fn push_fallback(
        &self,
        user_ids: &[Uuid],
        content: &NotificationContent,
    ) -> Option<PushOutcome> {
        let message = PushMessage::from_content(content);
        match self.push.push_to_users(user_ids, &message).await {
            Ok(outcome) => Some(outcome),
            Err(PushError::NotConfigured) => {
                tracing::warn!(
                    users = user_ids.len(),
                    "Push not configured, offline recipients will see the notification on next open"
                );
                None
            }
            Err(e) => {
                tracing::error!(error = %e, users = user_ids.len(), "Push fallback failed");
                None
            }
        }
    }
}
