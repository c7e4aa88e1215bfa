//! Notification inbox routes for the authenticated user.

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{NotificationPage, PageRequest, UnreadCount};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/mark-all-read", put(mark_all_read))
        .route("/api/notifications/{id}/read", put(mark_read))
}

/// Raw query values. Anything unparseable falls back to the defaults.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    fn normalize(&self) -> PageRequest {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
        PageRequest::new(parse(&self.page), parse(&self.limit))
    }
}

/// GET /api/notifications. Paginated inbox, newest first.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<NotificationPage>, AppError> {
    let page = state
        .service
        .list_notifications(auth.user_id, query.normalize())
        .await?;
    Ok(Json(page))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadCount>, AppError> {
    let count = state.service.unread_count(auth.user_id).await?;
    Ok(Json(UnreadCount { count }))
}

/// PUT /api/notifications/:id/read. Unknown or foreign ids succeed silently.
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notification_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation("Invalid notification ID".to_string()))?;

    state.service.mark_read(auth.user_id, notification_id).await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

/// PUT /api/notifications/mark-all-read
async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    state.service.mark_all_read(auth.user_id).await?;
    Ok(Json(json!({ "message": "All notifications marked as read" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_is_lenient() {
        let q = PageQuery {
            page: Some("abc".to_string()),
            limit: Some("500".to_string()),
        };
        assert_eq!(q.normalize(), PageRequest::new(Some(1), Some(50)));

        let q = PageQuery {
            page: Some("3".to_string()),
            limit: None,
        };
        assert_eq!(q.normalize(), PageRequest::new(Some(3), Some(20)));
    }
}
