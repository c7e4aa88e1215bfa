use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager for the price-change dedupe window.
///
/// The manager reconnects on its own, so a single instance is cloned into
/// every producer that needs it.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
