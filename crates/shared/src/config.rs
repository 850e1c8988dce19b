//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Idempotency gateway configuration.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Upper bound on how long a request may hold its tenant transaction open.
    ///
    /// `None` or `0` leaves the bound to database-side statement and lock
    /// timeouts.
    #[serde(default = "default_tenant_tx_timeout")]
    pub tenant_tx_timeout_secs: Option<u64>,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_tenant_tx_timeout() -> Option<u64> {
    Some(30)
}

/// JWT verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Which idempotency store backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyBackend {
    /// Single-process in-memory map.
    #[default]
    Memory,
    /// Shared Redis instance for multi-process deployments.
    Redis,
}

/// Idempotency gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    /// Store implementation selected at startup.
    #[serde(default)]
    pub backend: IdempotencyBackend,
    /// Redis URL, required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Lifetime of a `processing` placeholder that is never finalized.
    #[serde(default = "default_processing_ttl")]
    pub processing_ttl_secs: u64,
    /// Lifetime of a `completed` response snapshot.
    #[serde(default = "default_completed_ttl")]
    pub completed_ttl_secs: u64,
    /// How often the in-memory store sweeps expired records.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Largest response body the gateway will buffer and snapshot.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            backend: IdempotencyBackend::default(),
            redis_url: None,
            processing_ttl_secs: default_processing_ttl(),
            completed_ttl_secs: default_completed_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_processing_ttl() -> u64 {
    60
}

fn default_completed_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks settings that depend on each other.
    ///
    /// A `processing` placeholder must outlive the longest request that can
    /// hold it, otherwise a late finalize could overwrite or release a retry's
    /// fresh reservation of the same key.
    ///
    /// # Errors
    ///
    /// Returns a message error naming the conflicting settings.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if let Some(timeout) = self.database.tenant_tx_timeout_secs.filter(|secs| *secs > 0)
            && self.idempotency.processing_ttl_secs <= timeout
        {
            return Err(config::ConfigError::Message(format!(
                "idempotency.processing_ttl_secs ({}) must be greater than \
                 database.tenant_tx_timeout_secs ({timeout})",
                self.idempotency.processing_ttl_secs
            )));
        }
        Ok(())
    }
}
