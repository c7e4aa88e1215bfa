//! Producer entry points for the marketplace and chat services.
//!
//! Both return 202 as soon as the event is accepted. Delivery happens in the
//! background and its outcome is never reported back.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::MAX_TITLE_CHARS;
use herald_engine::chat::ChatMessage;
use herald_engine::price_change::PriceChange;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events/price-change", post(price_change))
        .route("/api/events/chat-message", post(chat_message))
}

#[derive(Debug, Deserialize)]
pub struct PriceChangeParams {
    pub listing_id: Uuid,
    pub listing_title: String,
    pub old_price: f64,
    pub new_price: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageParams {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub sender_name: String,
    pub participants: Vec<Uuid>,
    pub text: String,
}

/// POST /api/events/price-change. The caller is the listing's seller.
async fn price_change(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<PriceChangeParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if !params.old_price.is_finite() || !params.new_price.is_finite() {
        return Err(AppError::Validation("Prices must be finite numbers".to_string()));
    }

    state.price_changes.notify(PriceChange {
        listing_id: params.listing_id,
        seller_id: auth.user_id,
        listing_title: params.listing_title,
        old_price: params.old_price,
        new_price: params.new_price,
        image_url: params.image_url,
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

/// POST /api/events/chat-message. The caller is the sender.
async fn chat_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<ChatMessageParams>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if params.sender_name.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "sender_name must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }

    if !params.participants.contains(&auth.user_id) {
        return Err(AppError::Validation(
            "Sender is not a participant of the conversation".to_string(),
        ));
    }

    let recipients = state.chat.notify(&ChatMessage {
        conversation_id: params.conversation_id,
        message_id: params.message_id,
        sender_id: auth.user_id,
        sender_name: params.sender_name,
        participants: params.participants,
        text: params.text,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "recipients": recipients })),
    ))
}
