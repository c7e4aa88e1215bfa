//! Who has favorited a listing.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;

#[async_trait]
pub trait FavoriteLookup: Send + Sync {
    async fn users_favoriting(&self, listing_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn is_favorited(&self, user_id: Uuid, listing_id: Uuid) -> Result<bool, AppError>;
}

/// Reads the `listing_favorites` table.
#[derive(Clone)]
pub struct PgFavoriteLookup {
    pool: PgPool,
}

impl PgFavoriteLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteLookup for PgFavoriteLookup {
    async fn users_favoriting(&self, listing_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let users: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM listing_favorites WHERE listing_id = $1 ORDER BY created_at",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn is_favorited(&self, user_id: Uuid, listing_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM listing_favorites WHERE user_id = $1 AND listing_id = $2)",
        )
        .bind(user_id)
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
