//! Herald API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_common::db::{create_pool, run_migrations};
use herald_common::redis_pool::create_redis_pool;
use herald_engine::dedupe::{DedupeWindow, RedisDedupeWindow};
use herald_engine::favorites::PgFavoriteLookup;
use herald_engine::retention::RetentionSweeper;
use herald_engine::{NotificationStore, PgNotificationStore};
use herald_notifier::fcm::FcmTransport;
use herald_notifier::{PgDeviceRegistry, PushGateway, PushTransport};

use herald_api::routes::create_router;
use herald_api::state::{AppState, Backends};

/// Event payloads are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

const DEFAULT_LOG_FILTER: &str =
    "herald_api=debug,herald_engine=debug,herald_notifier=info,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Request span without the query string, which may carry a socket token.
fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Herald API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Database
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    // Redis only backs the price-change dedupe window; run without it if absent
    let dedupe: Option<Arc<dyn DedupeWindow>> = if config.price_change_dedupe_seconds == 0 {
        None
    } else {
        match create_redis_pool(&config.redis_url).await {
            Ok(redis) => Some(Arc::new(RedisDedupeWindow::new(
                redis,
                config.price_change_dedupe_seconds,
            ))),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, price-change dedupe disabled");
                None
            }
        }
    };

    // Push
    let transport: Option<Arc<dyn PushTransport>> = match FcmTransport::from_config(&config)? {
        Some(fcm) => {
            tracing::info!(project_id = fcm.project_id(), "FCM push enabled");
            Some(Arc::new(fcm))
        }
        None => {
            tracing::warn!("Firebase credentials not set, push notifications disabled");
            None
        }
    };
    let push = Arc::new(PushGateway::new(
        Arc::new(PgDeviceRegistry::new(pool.clone())),
        transport,
    ));

    let store: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(pool.clone()));

    if let Some(days) = config.notification_retention_days {
        RetentionSweeper::new(
            store.clone(),
            days,
            Duration::from_secs(config.retention_sweep_interval_secs.max(1)),
        )
        .spawn();
    }

    let port = config.http_port;
    let state = AppState::new(
        config,
        Backends {
            store,
            favorites: Arc::new(PgFavoriteLookup::new(pool)),
            push,
            dedupe,
        },
    );

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
