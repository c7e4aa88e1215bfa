use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (price-change dedupe)
    pub redis_url: String,

    /// Port the API server binds on
    pub http_port: u16,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Firebase project that owns the FCM sender
    pub firebase_project_id: Option<String>,

    /// Service-account key as an inline JSON string
    pub firebase_credentials_json: Option<String>,

    /// Service-account key as a path on disk (used when the JSON variant is unset)
    pub firebase_credentials_path: Option<String>,

    /// Android notification channel id attached to every push
    pub push_android_channel_id: String,

    /// Maximum number of detached dispatches running at once
    pub dispatch_concurrency: usize,

    /// Outbound queue depth for each realtime connection
    pub realtime_buffer: usize,

    /// Notifications older than this are purged. `None` disables the sweep.
    pub notification_retention_days: Option<u32>,

    /// Period of the retention sweep in seconds
    pub retention_sweep_interval_secs: u64,

    /// Window during which an identical price change is not re-announced
    pub price_change_dedupe_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            http_port: parse_var("HTTP_PORT", "3000")?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", "24")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            firebase_project_id: std::env::var("FIREBASE_PROJECT_ID").ok(),
            firebase_credentials_json: std::env::var("FIREBASE_CREDENTIALS_JSON").ok(),
            firebase_credentials_path: std::env::var("FIREBASE_CREDENTIALS_PATH").ok(),
            push_android_channel_id: std::env::var("PUSH_ANDROID_CHANNEL_ID")
                .unwrap_or_else(|_| "price_alerts".to_string()),
            dispatch_concurrency: parse_var("DISPATCH_CONCURRENCY", "64")?,
            realtime_buffer: parse_var("REALTIME_BUFFER", "64")?,
            notification_retention_days: match std::env::var("NOTIFICATION_RETENTION_DAYS") {
                Ok(v) => Some(v.parse().map_err(|_| {
                    anyhow::anyhow!("NOTIFICATION_RETENTION_DAYS must be a valid u32")
                })?),
                Err(_) => None,
            },
            retention_sweep_interval_secs: parse_var("RETENTION_SWEEP_INTERVAL_SECS", "3600")?,
            price_change_dedupe_seconds: parse_var("PRICE_CHANGE_DEDUPE_SECONDS", "300")?,
        })
    }

    /// Whether any Firebase credential source has been provided.
    pub fn push_configured(&self) -> bool {
        self.firebase_credentials_json.is_some() || self.firebase_credentials_path.is_some()
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        })
}
