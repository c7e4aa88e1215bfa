use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured notification payload.
///
/// Insertion order is preserved (`serde_json/preserve_order`), so a payload
/// read back from storage serializes to the same bytes it was written with.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Well-known notification type tags. The column itself is free-form.
pub mod kind {
    pub const GENERAL: &str = "general";
    pub const PRICE_CHANGE: &str = "price_change";
    pub const CHAT_MESSAGE: &str = "chat_message";
}

/// Default number of notifications per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Hard ceiling on the page size.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Column width of `notifications.title`, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// Column width of `notifications.notification_type`, in characters.
pub const MAX_KIND_CHARS: usize = 50;

/// Cut `value` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}

/// Content shared by every notification of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(rename = "type", default = "default_kind")]
    pub notification_type: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub data: Payload,
}

fn default_kind() -> String {
    kind::GENERAL.to_string()
}

/// A persisted notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub data: Payload,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Build a fresh unread notification for `user_id` with a new id.
    ///
    /// Title and type are cut to their column widths so one oversized field
    /// can never fail the insert of a whole batch.
    pub fn new(user_id: Uuid, content: &NotificationContent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: truncate_chars(&content.title, MAX_TITLE_CHARS),
            body: content.body.clone(),
            notification_type: truncate_chars(&content.notification_type, MAX_KIND_CHARS),
            image_url: content.image_url.clone(),
            data: content.data.clone(),
            is_read: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Database row for the `notifications` table.
///
/// `data` holds the serde_json text of the payload; it is stored as TEXT
/// rather than JSONB so key order survives.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub image_url: Option<String>,
    pub data: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = serde_json::Error;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            body: row.body,
            notification_type: row.notification_type,
            image_url: row.image_url,
            data: serde_json::from_str(&row.data)?,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Normalized pagination parameters. Out-of-range input is clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// `page` below 1 becomes 1. A missing or non-positive `limit` becomes
    /// [`DEFAULT_PAGE_SIZE`]; anything above [`MAX_PAGE_SIZE`] is capped.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = match limit {
            Some(l) if l >= 1 => l.min(MAX_PAGE_SIZE as i64) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a user's notifications plus their unread total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub unread_count: i64,
}

/// Response body of the unread-count endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// Event frame sent over a realtime connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    Notification(Notification),
    UnreadCount { count: i64 },
}
