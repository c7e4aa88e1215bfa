//! WebSocket endpoint for realtime delivery.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::{Router, response::IntoResponse};
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use herald_common::types::RealtimeEvent;
use herald_engine::NotificationService;

use crate::hub::ConnectionHub;
use crate::middleware::auth::WsAuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// GET /ws?token=<JWT>. Authentication happens before the upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    WsAuthUser(auth): WsAuthUser,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let service = state.service.clone();
    ws.on_upgrade(move |socket| handle_socket(hub, service, auth.user_id, socket))
}

async fn handle_socket(
    hub: Arc<ConnectionHub>,
    service: NotificationService,
    user_id: Uuid,
    socket: WebSocket,
) {
    let (connection_id, mut frames) = hub.register(user_id).await;
    let (mut sender, mut receiver) = socket.split();

    // Initial badge so the client does not need a separate request
    if let Ok(count) = service.unread_count(user_id).await
        && let Ok(frame) = serde_json::to_string(&RealtimeEvent::UnreadCount { count })
        && sender.send(Message::Text(frame.into())).await.is_err()
    {
        hub.unregister(user_id, connection_id).await;
        return;
    }

    loop {
        tokio::select! {
            maybe = frames.recv() => {
                let Some(frame) = maybe else { break };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, error = %e, "WebSocket read error");
                        break;
                    }
                    // Client frames carry no commands; pings are answered by axum
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unregister(user_id, connection_id).await;
}
