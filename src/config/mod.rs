//! Configuration management
//!
//! Configuration is loaded from `config.yml` and can be overridden through
//! `CHARITY_HUB_<SECTION>_<KEY>` environment variables. Every section has
//! defaults, so a missing or empty file yields a runnable development setup
//! (in-memory store, mock email, test Stripe keys from the environment).

use serde::{Deserialize, Serialize};

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "CHARITY_HUB";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the frontend)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store backend
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// MongoDB connection string
    #[serde(default = "default_database_uri")]
    pub uri: String,
    /// Database name
    #[serde(default = "default_database_name")]
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            uri: default_database_uri(),
            name: default_database_name(),
        }
    }
}

fn default_database_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "charity_hub".to_string()
}

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// MongoDB (default)
    #[default]
    Mongodb,
    /// Process-local store, data is lost on restart
    Memory,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens
    #[serde(default)]
    pub jwt_secret: String,
    /// Token lifetime in hours
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_hours: default_token_expiry_hours(),
        }
    }
}

fn default_token_expiry_hours() -> i64 {
    24 * 7
}

/// Stripe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    #[serde(default)]
    pub secret_key: String,
    /// Webhook endpoint signing secret (`whsec_...`)
    #[serde(default)]
    pub webhook_secret: String,
    /// Default currency for payments
    #[serde(default = "default_currency")]
    pub currency: String,
    /// API base URL
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            currency: default_currency(),
            api_base: default_stripe_api_base(),
        }
    }
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}

/// Email delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailMode {
    /// Log and record messages instead of sending them
    #[default]
    Mock,
    /// Gmail SMTP authenticated with an OAuth2 access token
    Gmail,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub mode: EmailMode,
    /// Sending mailbox, also the SMTP user
    #[serde(default)]
    pub user: String,
    /// Display name on outgoing mail
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: EmailMode::default(),
            user: String::new(),
            from_name: default_from_name(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            smtp_host: default_smtp_host(),
        }
    }
}

fn default_from_name() -> String {
    "Charity Hub".to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration; invalid
    /// YAML is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides and validate
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run against a real database
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.driver == DatabaseDriver::Mongodb && self.auth.jwt_secret.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must be set when using the mongodb driver".to_string(),
            ));
        }
        if self.auth.token_expiry_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.token_expiry_hours must be positive".to_string(),
            ));
        }
        if self.email.mode == EmailMode::Gmail && self.email.user.is_empty() {
            return Err(ConfigError::ValidationError(
                "email.user must be set in gmail mode".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(host) = env("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(origin) = env("SERVER_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }

        if let Some(driver) = env("DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "mongodb" => self.database.driver = DatabaseDriver::Mongodb,
                "memory" => self.database.driver = DatabaseDriver::Memory,
                _ => {}
            }
        }
        if let Some(uri) = env("DATABASE_URI") {
            self.database.uri = uri;
        }
        if let Some(name) = env("DATABASE_NAME") {
            self.database.name = name;
        }

        if let Some(ttl) = env("CACHE_TTL_SECONDS").and_then(|t| t.parse().ok()) {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(secret) = env("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(hours) = env("AUTH_TOKEN_EXPIRY_HOURS").and_then(|h| h.parse().ok()) {
            self.auth.token_expiry_hours = hours;
        }

        if let Some(key) = env("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = key;
        }
        if let Some(secret) = env("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = secret;
        }
        if let Some(currency) = env("STRIPE_CURRENCY") {
            self.stripe.currency = currency.to_lowercase();
        }

        if let Some(mode) = env("EMAIL_MODE") {
            match mode.to_lowercase().as_str() {
                "mock" => self.email.mode = EmailMode::Mock,
                "gmail" => self.email.mode = EmailMode::Gmail,
                _ => {}
            }
        }
        if let Some(user) = env("EMAIL_USER") {
            self.email.user = user;
        }
        if let Some(id) = env("EMAIL_CLIENT_ID") {
            self.email.client_id = id;
        }
        if let Some(secret) = env("EMAIL_CLIENT_SECRET") {
            self.email.client_secret = secret;
        }
        if let Some(token) = env("EMAIL_REFRESH_TOKEN") {
            self.email.refresh_token = token;
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok()
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
