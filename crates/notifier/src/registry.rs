//! Device token lookup.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::PushError;

/// Read-only view of the device registry owned by the account service.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Every token registered for any of `user_ids`. Users without a device
    /// simply contribute nothing.
    async fn tokens_for(&self, user_ids: &[Uuid]) -> Result<Vec<String>, PushError>;
}

/// `user_devices` table in PostgreSQL.
#[derive(Clone)]
pub struct PgDeviceRegistry {
    pool: PgPool,
}

impl PgDeviceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRegistry for PgDeviceRegistry {
    async fn tokens_for(&self, user_ids: &[Uuid]) -> Result<Vec<String>, PushError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let tokens: Vec<String> = sqlx::query_scalar(
            "SELECT fcm_token FROM user_devices WHERE user_id = ANY($1) ORDER BY created_at",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }
}
