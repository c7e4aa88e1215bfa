//! Live WebSocket connection registry.
//!
//! Each connection owns a bounded outbound queue. Senders never wait on a
//! slow socket: a full or closed queue counts as "not delivered" and the
//! engine falls back to push for that user.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use herald_common::types::RealtimeEvent;
use herald_engine::Presence;

/// Outbound queue of serialized event frames for one connection.
pub type FrameSender = mpsc::Sender<String>;

struct Connection {
    id: Uuid,
    sender: FrameSender,
}

/// Map of user -> live connections. A user may hold several at once.
pub struct ConnectionHub {
    connections: RwLock<HashMap<Uuid, Vec<Connection>>>,
    buffer: usize,
}

impl ConnectionHub {
    /// `buffer` is the per-connection queue depth.
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Open a connection for `user_id`. Returns its id and the frame receiver
    /// the socket task drains.
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let mut connections = self.connections.write().await;
        connections
            .entry(user_id)
            .or_default()
            .push(Connection { id, sender });

        tracing::debug!(user_id = %user_id, connection_id = %id, "Realtime connection registered");
        (id, receiver)
    }

    pub async fn unregister(&self, user_id: Uuid, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(list) = connections.get_mut(&user_id) {
            list.retain(|c| c.id != connection_id);
            if list.is_empty() {
                connections.remove(&user_id);
            }
        }
        tracing::debug!(user_id = %user_id, connection_id = %connection_id, "Realtime connection closed");
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.connections
            .read()
            .await
            .get(&user_id)
            .map_or(0, |list| list.len())
    }

    pub async fn online_users(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue `frame` on every connection of `user_id`. `true` if at least one
    /// connection accepted it.
    async fn send_frame(&self, user_id: Uuid, frame: &str) -> bool {
        let connections = self.connections.read().await;
        let Some(list) = connections.get(&user_id) else {
            return false;
        };

        let mut delivered = false;
        for connection in list {
            match connection.sender.try_send(frame.to_string()) {
                Ok(()) => delivered = true,
                Err(mpsc::error::TrySendError::Full(_)) => tracing::debug!(
                    user_id = %user_id,
                    connection_id = %connection.id,
                    "Realtime queue full, frame dropped"
                ),
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

#[async_trait]
impl Presence for ConnectionHub {
    async fn is_online(&self, user_id: Uuid) -> bool {
        self.connections
            .read()
            .await
            .get(&user_id)
            .is_some_and(|list| list.iter().any(|c| !c.sender.is_closed()))
    }

    async fn try_send(&self, user_id: Uuid, event: &RealtimeEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(frame) => self.send_frame(user_id, &frame).await,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to encode realtime event");
                false
            }
        }
    }

    async fn send_unread_count(&self, user_id: Uuid, count: i64) {
        // Stale badges are tolerated
        let _ = self
            .try_send(user_id, &RealtimeEvent::UnreadCount { count })
            .await;
    }
}
