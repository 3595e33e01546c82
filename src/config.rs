//! Process configuration, loaded once at startup from the environment.
//!
//! Shape and the `from_env` idiom are grounded in the session-scheduler
//! service's `AppConfig::from_env` (`std::env::var(..).unwrap_or_else(..)`
//! for optional settings); unlike that example, settings with no sane
//! default (the Postgres DSN, the JWT secret) are required and missing ones
//! fail startup via [`ConfigError`] rather than falling back silently.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP/WebSocket server binds to, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
    /// Postgres connection string backing the Durable Store.
    pub database_url: String,
    pub database_max_connections: u32,
    /// This node's snowflake id, 0..=1023. Must be unique per running
    /// process in a multi-node deployment.
    pub node_id: u16,
    /// Shard (and consumer-task) count for both Order Queue topics.
    pub queue_shard_count: usize,
    pub queue_shard_capacity: usize,
    /// Per-user lock TTL and reservation hold applied in AH/OW (§3).
    pub lock_ttl: Duration,
    /// Lifecycle scheduler tick intervals (§4.6).
    pub activity_tick_interval: Duration,
    pub reaper_tick_interval: Duration,
    pub reaper_batch_limit: i64,
    /// How long a Pending order may sit before the reaper cancels it
    /// (§4.4's 15-minute payment window).
    pub order_expiry: Duration,
    /// Secret used to verify inbound JWTs (HS256).
    pub jwt_secret: String,

    // logging, field names mirror what `crate::logging::init_logging` reads
    pub log_dir: String,
    pub log_file: String,
    pub log_level: String,
    pub rotation: String,
    pub use_json: bool,
    pub enable_tracing: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", "20").parse().map_err(
                |_| ConfigError::Invalid("DATABASE_MAX_CONNECTIONS", env_or("DATABASE_MAX_CONNECTIONS", "20")),
            )?,
            node_id: parse_env("NODE_ID", "1")?,
            queue_shard_count: parse_env("QUEUE_SHARD_COUNT", "8")?,
            queue_shard_capacity: parse_env("QUEUE_SHARD_CAPACITY", "4096")?,
            lock_ttl: Duration::from_secs(parse_env("LOCK_TTL_SECS", "10")?),
            activity_tick_interval: Duration::from_secs(parse_env("ACTIVITY_TICK_SECS", "10")?),
            reaper_tick_interval: Duration::from_secs(parse_env("REAPER_TICK_SECS", "30")?),
            reaper_batch_limit: parse_env("REAPER_BATCH_LIMIT", "100")?,
            order_expiry: Duration::from_secs(parse_env("ORDER_EXPIRY_SECS", "900")?),
            jwt_secret: require_env("JWT_SECRET")?,

            log_dir: env_or("LOG_DIR", "logs"),
            log_file: env_or("LOG_FILE", "flash_rush.log"),
            log_level: env_or("LOG_LEVEL", "info"),
            rotation: env_or("LOG_ROTATION", "daily"),
            use_json: parse_env("LOG_JSON", "false")?,
            enable_tracing: parse_env("ENABLE_TRACING", "true")?,
        })
    }
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = env_or(key, default);
    raw.parse()
        .map_err(|_| ConfigError::Invalid(key, raw))
}
