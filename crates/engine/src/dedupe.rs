//! Suppression of repeated price-change events.
//!
//! Only an exact repeat of the last announced change for a listing (same old
//! and new price) inside the window is dropped. A price that moves down, back
//! up and down again announces every step.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use uuid::Uuid;

/// Remembers the most recent change announced per listing.
#[async_trait]
pub trait DedupeWindow: Send + Sync {
    /// Records `old_price -> new_price` as the listing's latest change and
    /// returns `false` when it equals the change already recorded.
    async fn first_seen(
        &self,
        listing_id: Uuid,
        old_price: f64,
        new_price: f64,
    ) -> anyhow::Result<bool>;
}

/// Redis implementation. One key per listing holds the last change and
/// expires with the window.
#[derive(Clone)]
pub struct RedisDedupeWindow {
    redis: ConnectionManager,
    window_secs: u64,
}

impl RedisDedupeWindow {
    pub fn new(redis: ConnectionManager, window_secs: u64) -> Self {
        Self { redis, window_secs }
    }

    fn key(listing_id: Uuid) -> String {
        format!("price_change:last:{}", listing_id)
    }
}

/// Whole-unit rendering used for comparison, matching the payload format.
pub fn change_marker(old_price: f64, new_price: f64) -> String {
    format!("{:.0}:{:.0}", old_price, new_price)
}

#[async_trait]
impl DedupeWindow for RedisDedupeWindow {
    async fn first_seen(
        &self,
        listing_id: Uuid,
        old_price: f64,
        new_price: f64,
    ) -> anyhow::Result<bool> {
        let marker = change_marker(old_price, new_price);
        let mut conn = self.redis.clone();

        // SET .. GET swaps in the new marker and hands back the previous one
        let previous: Option<String> = redis::cmd("SET")
            .arg(Self::key(listing_id))
            .arg(&marker)
            .arg("EX")
            .arg(self.window_secs)
            .arg("GET")
            .query_async(&mut conn)
            .await?;

        let first = previous.as_deref() != Some(marker.as_str());
        if !first {
            tracing::debug!(
                listing_id = %listing_id,
                change = %marker,
                window_secs = self.window_secs,
                "Price change suppressed, already announced"
            );
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_per_listing() {
        assert_eq!(
            RedisDedupeWindow::key(Uuid::nil()),
            "price_change:last:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_marker_includes_both_prices() {
        assert_eq!(change_marker(20000.0, 18000.4), "20000:18000");
        assert_ne!(change_marker(20000.0, 18000.0), change_marker(19000.0, 18000.0));
    }
}
