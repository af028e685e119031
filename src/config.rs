use crate::application::circuit_breaker::CircuitBreakerConfig;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every command. Each flag can also be set through its environment variable.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the ledger service. Without it transfers go to an in-process loopback ledger.
    #[arg(long, env = "TRANSFER_LEDGER_URL", global = true)]
    pub ledger_url: Option<String>,

    /// Upper bound on a single ledger call, in milliseconds.
    #[arg(long, env = "TRANSFER_LEDGER_TIMEOUT_MS", default_value_t = 5_000, global = true)]
    pub ledger_timeout_ms: u64,

    /// Consecutive ledger failures that open the circuit breaker.
    #[arg(long, env = "TRANSFER_BREAKER_FAILURE_THRESHOLD", default_value_t = 5, global = true)]
    pub breaker_failure_threshold: u32,

    /// Seconds the circuit stays open before trial calls are let through.
    #[arg(long, env = "TRANSFER_BREAKER_OPEN_COOLDOWN_SECS", default_value_t = 60, global = true)]
    pub breaker_open_cooldown_secs: u64,

    /// Trial calls admitted while the circuit is half-open.
    #[arg(long, env = "TRANSFER_BREAKER_HALF_OPEN_CALLS", default_value_t = 3, global = true)]
    pub breaker_half_open_calls: u32,

    /// Hours an idempotency key stays bound to its transfer (at least one).
    #[arg(long, env = "TRANSFER_IDEMPOTENCY_TTL_HOURS", default_value_t = 24, global = true)]
    pub idempotency_ttl_hours: i64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "TRANSFER_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Default log filter, overridden by `RUST_LOG`.
    #[arg(long, env = "TRANSFER_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "TRANSFER_LOG_JSON", global = true)]
    pub log_json: bool,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ledger_url: Option<String>,
    pub ledger_timeout: Duration,
    pub breaker: CircuitBreakerConfig,
    pub idempotency_ttl: chrono::Duration,
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl From<Settings> for AppConfig {
    fn from(settings: Settings) -> Self {
        Self {
            ledger_url: settings.ledger_url.filter(|url| !url.trim().is_empty()),
            ledger_timeout: Duration::from_millis(settings.ledger_timeout_ms),
            breaker: CircuitBreakerConfig {
                failure_threshold: settings.breaker_failure_threshold.max(1),
                open_cooldown: Duration::from_secs(settings.breaker_open_cooldown_secs),
                half_open_max_calls: settings.breaker_half_open_calls.max(1),
            },
            idempotency_ttl: chrono::Duration::try_hours(settings.idempotency_ttl_hours.max(1))
                .unwrap_or(chrono::Duration::MAX),
            db_path: settings.db_path,
            log_level: settings.log_level,
            log_json: settings.log_json,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger_url: None,
            ledger_timeout: crate::application::gateway::DEFAULT_LEDGER_TIMEOUT,
            breaker: CircuitBreakerConfig::default(),
            idempotency_ttl: crate::domain::idempotency::IDEMPOTENCY_TTL,
            db_path: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
