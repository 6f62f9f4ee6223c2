use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PRODIGI_BASE_URL: &str = "https://api.prodigi.com/v4.0";
const DEFAULT_STRIPE_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_SHIPPING_METHOD: &str = "Budget";
const DEFAULT_DESTINATION_COUNTRY: &str = "ES";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
const DEFAULT_UPSTREAM_RETRIES: u32 = 2;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_webhook_secret"))]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Print provider (Prodigi) API key
    pub prodigi_api_key: String,

    /// Print provider base URL
    #[serde(default = "default_prodigi_base_url")]
    pub prodigi_base_url: String,

    /// Payment processor (Stripe) secret key
    pub stripe_secret_key: String,

    /// Payment processor base URL (overridable for tests)
    #[serde(default = "default_stripe_base_url")]
    pub stripe_base_url: String,

    /// Webhook signing secret for verifying payment processor callbacks.
    /// Optional only in development; without it every webhook body is
    /// trusted, and a forged success event places a real provider order.
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub payment_webhook_tolerance_secs: u64,

    /// Shipping method used when neither the request nor the catalog
    /// carries one
    #[serde(default = "default_shipping_method")]
    pub default_shipping_method: String,

    /// Destination country used when a quote request omits one
    #[serde(default = "default_destination_country")]
    #[validate(length(equal = 2), custom = "validate_country_code")]
    pub default_destination_country: String,

    /// Public base URL used to build absolute asset URLs from locally
    /// stored relative image paths
    pub public_base_url: String,

    /// Per-request timeout for provider/processor HTTP calls (seconds)
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Retry attempts for idempotent provider calls
    #[serde(default = "default_upstream_retries")]
    pub upstream_retries: u32,

    /// API key protecting the administrative order endpoints
    pub admin_api_key: String,
}

fn validate_webhook_secret(config: &AppConfig) -> Result<(), ValidationError> {
    if config.is_development() {
        return Ok(());
    }
    match config.stripe_webhook_secret.as_deref() {
        Some(secret) if !secret.trim().is_empty() => Ok(()),
        _ => {
            let mut err = ValidationError::new("stripe_webhook_secret");
            err.message =
                Some("stripe_webhook_secret is required outside the development environment".into());
            Err(err)
        }
    }
}

fn validate_country_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("country_code");
        err.message = Some("Country code must be a 2-letter ISO code".into());
        Err(err)
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_prodigi_base_url() -> String {
    DEFAULT_PRODIGI_BASE_URL.to_string()
}

fn default_stripe_base_url() -> String {
    DEFAULT_STRIPE_BASE_URL.to_string()
}

fn default_shipping_method() -> String {
    DEFAULT_SHIPPING_METHOD.to_string()
}

fn default_destination_country() -> String {
    DEFAULT_DESTINATION_COUNTRY.to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_upstream_retries() -> u32 {
    DEFAULT_UPSTREAM_RETRIES
}

fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

/// Initializes the tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("printfolio_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: the Prodigi/Stripe credentials have no defaults - they MUST be
    // provided via environment variables or a config file.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://printfolio.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("public_base_url", "http://localhost:8080")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    for key in ["prodigi_api_key", "stripe_secret_key", "admin_api_key"] {
        if config.get_string(key).is_err() {
            error!(
                "{} is not configured. Set APP__{} or add it to a config file.",
                key,
                key.to_uppercase()
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured",
                key
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            prodigi_api_key: "test-key".into(),
            prodigi_base_url: default_prodigi_base_url(),
            stripe_secret_key: "sk_test_123".into(),
            stripe_base_url: default_stripe_base_url(),
            stripe_webhook_secret: Some("whsec_test".into()),
            payment_webhook_tolerance_secs: 300,
            default_shipping_method: default_shipping_method(),
            default_destination_country: default_destination_country(),
            public_base_url: "https://printfolio.example".into(),
            upstream_timeout_secs: 15,
            upstream_retries: 2,
            admin_api_key: "admin-key".into(),
        }
    }

    #[test]
    fn validates_destination_country() {
        let mut cfg = base_config();
        assert!(cfg.validate().is_ok());

        cfg.default_destination_country = "E1".into();
        assert!(cfg.validate().is_err());

        cfg.default_destination_country = "ESP".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn webhook_secret_required_outside_development() {
        let mut cfg = base_config();
        cfg.stripe_webhook_secret = None;
        assert!(cfg.validate().is_ok());

        cfg.environment = "production".into();
        assert!(cfg.validate().is_err());

        cfg.stripe_webhook_secret = Some("  ".into());
        assert!(cfg.validate().is_err());

        cfg.stripe_webhook_secret = Some("whsec_live".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn environment_helpers() {
        let mut cfg = base_config();
        assert!(cfg.is_development());
        cfg.environment = "production".into();
        assert!(!cfg.is_development());
    }
}
