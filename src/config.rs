use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::ServiceError;
use crate::models::{Amount, Currency, PaymentProvider, TaxRate};
use crate::services::checkout::CheckoutSettings;
use crate::services::pricing::{StaticPriceBook, UnknownItemPolicy};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE: &str = "0.0825";
const DEFAULT_UNIT_PRICE: i64 = 5000;
const DEFAULT_WEBHOOK_MAX_RETRIES: u32 = 3;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// ISO 4217 code every session is priced in
    #[validate(custom = "validate_currency")]
    pub currency: String,

    /// Flat tax rate as a decimal fraction, kept as text so it parses exactly
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: String,

    /// Catalog item id -> unit price in minor units
    #[serde(default)]
    #[validate(custom = "validate_price_book")]
    pub price_book: HashMap<String, i64>,

    /// Unit price applied to unknown items under the `default_price` policy
    #[validate(range(min = 1, max = 1_000_000_000_000))]
    pub default_unit_price: i64,

    /// `default_price` or `reject`
    #[validate(custom = "validate_unknown_item_policy")]
    pub unknown_item_policy: String,

    #[validate(length(min = 1, max = 128))]
    pub merchant_id: String,

    /// Base for order permalinks and policy links
    #[validate(url)]
    pub merchant_base_url: String,

    #[validate(length(min = 1, max = 64))]
    pub payment_provider: String,

    #[validate(length(min = 1))]
    pub supported_payment_methods: Vec<String>,

    /// Agent platform endpoint for order events; events are only logged when unset
    #[serde(default)]
    #[validate(url)]
    pub webhook_url: Option<String>,

    /// HMAC secret for the `Merchant-Signature` header
    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[validate(range(min = 1, max = 10))]
    pub webhook_max_retries: u32,

    /// Accepted bearer tokens; an empty list disables authentication
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl AppConfig {
    pub fn tax_rate(&self) -> Result<TaxRate, ServiceError> {
        let rate = Decimal::from_str(self.tax_rate.trim())
            .map_err(|e| ServiceError::validation(format!("Invalid tax_rate: {}", e)))?;
        TaxRate::new(rate)
    }

    pub fn unknown_item_policy(&self) -> Result<UnknownItemPolicy, ServiceError> {
        match self.unknown_item_policy.trim().to_ascii_lowercase().as_str() {
            "default_price" => Ok(UnknownItemPolicy::DefaultPrice(Amount::new(
                self.default_unit_price,
            )?)),
            "reject" => Ok(UnknownItemPolicy::Reject),
            other => Err(ServiceError::validation(format!(
                "Unknown item policy '{}' must be default_price or reject",
                other
            ))),
        }
    }

    pub fn price_book(&self) -> Result<StaticPriceBook, ServiceError> {
        let prices = self
            .price_book
            .iter()
            .map(|(item_id, price)| Ok((item_id.clone(), Amount::new(*price)?)))
            .collect::<Result<HashMap<_, _>, ServiceError>>()?;
        Ok(StaticPriceBook::new(prices))
    }

    pub fn checkout_settings(&self) -> Result<CheckoutSettings, ServiceError> {
        Ok(CheckoutSettings {
            currency: Currency::parse(&self.currency)?,
            payment_provider: PaymentProvider {
                provider: self.payment_provider.clone(),
                supported_payment_methods: self.supported_payment_methods.clone(),
            },
            merchant_base_url: self.merchant_base_url.clone(),
        })
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Configuration value rejected: {0}")]
    Invalid(#[from] ServiceError),
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_currency(code: &str) -> Result<(), ValidationError> {
    Currency::parse(code).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("currency");
        err.message = Some("currency must be a three-letter ISO 4217 code".into());
        err
    })
}

fn validate_tax_rate(rate: &str) -> Result<(), ValidationError> {
    let in_range = Decimal::from_str(rate.trim())
        .map(|rate| rate >= Decimal::ZERO && rate <= Decimal::ONE)
        .unwrap_or(false);
    if !in_range {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("tax_rate must be a decimal between 0 and 1".into());
        return Err(err);
    }
    Ok(())
}

fn validate_price_book(prices: &HashMap<String, i64>) -> Result<(), ValidationError> {
    if let Some((item_id, _)) = prices.iter().find(|(_, price)| Amount::new(**price).is_err()) {
        let mut err = ValidationError::new("price_book");
        err.message = Some(format!("price for {} is out of range", item_id).into());
        return Err(err);
    }
    Ok(())
}

fn validate_unknown_item_policy(policy: &str) -> Result<(), ValidationError> {
    match policy.trim().to_ascii_lowercase().as_str() {
        "default_price" | "reject" => Ok(()),
        _ => {
            let mut err = ValidationError::new("unknown_item_policy");
            err.message = Some("Must be one of: default_price, reject".into());
            Err(err)
        }
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("agentic_checkout={},tower_http=debug", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same layering as [`load_config`] rooted at an explicit directory.
pub fn load_config_from(dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("currency", "usd")?
        .set_default("tax_rate", DEFAULT_TAX_RATE)?
        .set_default("price_book.item_123", 1500)?
        .set_default("default_unit_price", DEFAULT_UNIT_PRICE)?
        .set_default("unknown_item_policy", "default_price")?
        .set_default("merchant_id", "merchant_123")?
        .set_default("merchant_base_url", "https://merchant.example.com")?
        .set_default("payment_provider", "stripe")?
        .set_default("supported_payment_methods", vec!["card"])?
        .set_default("webhook_max_retries", i64::from(DEFAULT_WEBHOOK_MAX_RETRIES))?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(run_env)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("api_keys")
                .with_list_parse_key("supported_payment_methods"),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
