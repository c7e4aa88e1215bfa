//! Presence capability consumed by the fanout engine.
//!
//! The realtime layer needs the engine (to build services) and the engine
//! needs the realtime layer (to reach online users). [`PresenceSlot`] breaks
//! the cycle: the engine is built with an empty slot and the connection hub is
//! bound into it once it exists.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use uuid::Uuid;

use herald_common::types::RealtimeEvent;

/// Live-connection registry as seen by the engine.
#[async_trait]
pub trait Presence: Send + Sync {
    async fn is_online(&self, user_id: Uuid) -> bool;

    /// Hand `event` to every live connection of `user_id` without waiting.
    /// Returns `false` straight away when the user has no connection that
    /// accepted it.
    async fn try_send(&self, user_id: Uuid, event: &RealtimeEvent) -> bool;

    /// Best-effort badge update. Failures are swallowed.
    async fn send_unread_count(&self, user_id: Uuid, count: i64);
}

/// Set-once, shareable holder for the process's presence registry.
///
/// Unbound, it reports every user as offline.
#[derive(Clone, Default)]
pub struct PresenceSlot {
    inner: Arc<OnceLock<Arc<dyn Presence>>>,
}

impl PresenceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the registry. Returns `false` if one was already bound.
    pub fn bind(&self, presence: Arc<dyn Presence>) -> bool {
        let bound = self.inner.set(presence).is_ok();
        if !bound {
            tracing::warn!("Presence registry already bound, ignoring rebind");
        }
        bound
    }

    pub fn is_bound(&self) -> bool {
        self.inner.get().is_some()
    }
}

#[async_trait]
impl Presence for PresenceSlot {
    async fn is_online(&self, user_id: Uuid) -> bool {
        match self.inner.get() {
            Some(p) => p.is_online(user_id).await,
            None => false,
        }
    }

    async fn try_send(&self, user_id: Uuid, event: &RealtimeEvent) -> bool {
        match self.inner.get() {
            Some(p) => p.try_send(user_id, event).await,
            None => false,
        }
    }

    async fn send_unread_count(&self, user_id: Uuid, count: i64) {
        if let Some(p) = self.inner.get() {
            p.send_unread_count(user_id, count).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOnline;

    #[async_trait]
    impl Presence for AlwaysOnline {
        async fn is_online(&self, _user_id: Uuid) -> bool {
            true
        }
        async fn try_send(&self, _user_id: Uuid, _event: &RealtimeEvent) -> bool {
            true
        }
        async fn send_unread_count(&self, _user_id: Uuid, _count: i64) {}
    }

    #[tokio::test]
    async fn test_unbound_slot_is_offline() {
        let slot = PresenceSlot::new();
        let user = Uuid::new_v4();
        assert!(!slot.is_online(user).await);
        assert!(
            !slot
                .try_send(user, &RealtimeEvent::UnreadCount { count: 1 })
                .await
        );
    }

    #[tokio::test]
    async fn test_bind_is_shared_and_set_once() {
        let slot = PresenceSlot::new();
        let clone = slot.clone();

        assert!(slot.bind(Arc::new(AlwaysOnline)));
        assert!(!slot.bind(Arc::new(AlwaysOnline)));
        assert!(clone.is_bound());
        assert!(clone.is_online(Uuid::new_v4()).await);
    }
}
