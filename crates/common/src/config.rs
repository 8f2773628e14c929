//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Payment processor configuration.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Live wall timing configuration.
    #[serde(default)]
    pub live_wall: LiveWallConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance, used for upload links and QR codes.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding stored objects.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// Secret used to sign object URLs.
    pub signing_secret: String,
    /// Lifetime of signed URLs handed out for uploads, in seconds.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

/// Payment processor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Base URL of the payment API.
    #[serde(default = "default_payment_api")]
    pub api_base: String,
    /// Secret API key. Checkout is unavailable without it.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Secret used to verify webhook signatures.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// ISO currency code for checkout sessions.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Maximum accepted age of a webhook signature timestamp, in seconds.
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_payment_api(),
            secret_key: None,
            webhook_secret: None,
            currency: default_currency(),
            webhook_tolerance_secs: default_webhook_tolerance(),
        }
    }
}

/// Live wall timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveWallConfig {
    /// Quiet period after the last change notification before refetching.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay between completing a round and re-sorting in newest-first mode.
    #[serde(default = "default_reorder_delay_ms")]
    pub reorder_delay_ms: u64,
}

impl Default for LiveWallConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            reorder_delay_ms: default_reorder_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

const fn default_signed_url_ttl() -> u64 {
    365 * 24 * 60 * 60
}

fn default_payment_api() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "eur".to_string()
}

const fn default_webhook_tolerance() -> i64 {
    300
}

const fn default_debounce_ms() -> u64 {
    300
}

const fn default_reorder_delay_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PHOTOWALL_ENV`)
    /// 3. Environment variables with `PHOTOWALL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("PHOTOWALL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PHOTOWALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PHOTOWALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Public URL guests open to upload to an event.
    #[must_use]
    pub fn upload_url(&self, event_code: &str) -> String {
        format!("{}/e/{}", self.server.url.trim_end_matches('/'), event_code)
    }

    /// Base URL under which stored objects are served.
    #[must_use]
    pub fn files_url(&self) -> String {
        format!("{}/files", self.server.url.trim_end_matches('/'))
    }
}
