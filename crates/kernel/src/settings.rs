use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "SHELF_ENV";
const CONFIG_DIR_ENV: &str = "SHELF_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub currency: CurrencySettings,
    #[serde(default)]
    pub cart: CartSettings,
    #[serde(default)]
    pub checkout: CheckoutSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .with_context(|| "unable to resolve current directory")?,
        };

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        // Nested keys use a double underscore: SHELF_CHECKOUT__SECRET_KEY.
        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHELF")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Absolute base URL the storefront is reachable at; used to build
    /// checkout return URLs handed to the payment provider.
    #[serde(default = "ServerSettings::default_public_url")]
    pub public_url: String,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_public_url() -> String {
        "http://localhost:8080".to_string()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            public_url: Self::default_public_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Book data providers.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "CatalogSettings::default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Primary bookstore API; when unset only the public catalog is queried.
    #[serde(default)]
    pub bookstore_base_url: Option<String>,
    #[serde(default)]
    pub bookstore_token: Option<String>,
    #[serde(default = "CatalogSettings::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "CatalogSettings::default_max_results")]
    pub max_results: u32,
    #[serde(default = "CatalogSettings::default_max_start_index")]
    pub max_start_index: u32,
}

impl CatalogSettings {
    fn default_public_base_url() -> String {
        "https://www.googleapis.com/books/v1".to_string()
    }

    fn default_timeout_secs() -> u64 {
        5
    }

    fn default_max_results() -> u32 {
        40
    }

    fn default_max_start_index() -> u32 {
        1000
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            public_base_url: Self::default_public_base_url(),
            api_key: None,
            bookstore_base_url: None,
            bookstore_token: None,
            timeout_secs: Self::default_timeout_secs(),
            max_results: Self::default_max_results(),
            max_start_index: Self::default_max_start_index(),
        }
    }
}

/// Exchange rate source and its fallback constants.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "CurrencySettings::default_rates_url")]
    pub rates_url: String,
    #[serde(default = "CurrencySettings::default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "CurrencySettings::default_buy")]
    pub default_buy: f64,
    #[serde(default = "CurrencySettings::default_sell")]
    pub default_sell: f64,
    #[serde(default = "CurrencySettings::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CurrencySettings {
    fn default_rates_url() -> String {
        "https://api.apis.net.pe/v1/tipo-cambio-sunat".to_string()
    }

    fn default_ttl_secs() -> u64 {
        12 * 3600
    }

    fn default_buy() -> f64 {
        3.387
    }

    fn default_sell() -> f64 {
        3.396
    }

    fn default_timeout_secs() -> u64 {
        10
    }
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            rates_url: Self::default_rates_url(),
            ttl_secs: Self::default_ttl_secs(),
            default_buy: Self::default_buy(),
            default_sell: Self::default_sell(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Cart pricing constants.
#[derive(Debug, Clone, Deserialize)]
pub struct CartSettings {
    #[serde(default = "CartSettings::default_unit_price")]
    pub default_unit_price: f64,
    #[serde(default = "CartSettings::default_free_shipping_threshold")]
    pub free_shipping_threshold: f64,
    #[serde(default = "CartSettings::default_shipping_fee")]
    pub shipping_fee: f64,
    #[serde(default = "CartSettings::default_max_quantity")]
    pub max_quantity: u32,
}

impl CartSettings {
    fn default_unit_price() -> f64 {
        25.0
    }

    fn default_free_shipping_threshold() -> f64 {
        50.0
    }

    fn default_shipping_fee() -> f64 {
        5.0
    }

    fn default_max_quantity() -> u32 {
        10
    }
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            default_unit_price: Self::default_unit_price(),
            free_shipping_threshold: Self::default_free_shipping_threshold(),
            shipping_fee: Self::default_shipping_fee(),
            max_quantity: Self::default_max_quantity(),
        }
    }
}

/// Hosted payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSettings {
    #[serde(default = "CheckoutSettings::default_payment_base_url")]
    pub payment_base_url: String,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub publishable_key: Option<String>,
    #[serde(default = "CheckoutSettings::default_currency")]
    pub currency: String,
    #[serde(default = "CheckoutSettings::default_require_auth")]
    pub require_auth: bool,
    #[serde(default = "CheckoutSettings::default_revalidation_concurrency")]
    pub revalidation_concurrency: usize,
    #[serde(default = "CheckoutSettings::default_allowed_countries")]
    pub allowed_countries: Vec<String>,
    #[serde(default = "CheckoutSettings::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CheckoutSettings {
    fn default_payment_base_url() -> String {
        "https://api.stripe.com".to_string()
    }

    fn default_currency() -> String {
        "usd".to_string()
    }

    fn default_require_auth() -> bool {
        true
    }

    fn default_revalidation_concurrency() -> usize {
        4
    }

    fn default_allowed_countries() -> Vec<String> {
        ["US", "CA", "MX", "PE", "CO", "AR", "CL", "ES"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn default_timeout_secs() -> u64 {
        10
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            payment_base_url: Self::default_payment_base_url(),
            secret_key: None,
            publishable_key: None,
            currency: Self::default_currency(),
            require_auth: Self::default_require_auth(),
            revalidation_concurrency: Self::default_revalidation_concurrency(),
            allowed_countries: Self::default_allowed_countries(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "SessionSettings::default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure: bool,
    /// Sessions untouched for this long are evicted
    #[serde(default = "SessionSettings::default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl SessionSettings {
    fn default_cookie_name() -> String {
        "shelf_session".to_string()
    }

    fn default_idle_timeout_secs() -> u64 {
        2 * 3600
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            secure: false,
            idle_timeout_secs: Self::default_idle_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_cart_constants() {
        let settings = Settings::default();
        assert_eq!(settings.cart.default_unit_price, 25.0);
        assert_eq!(settings.cart.free_shipping_threshold, 50.0);
        assert_eq!(settings.cart.shipping_fee, 5.0);
        assert_eq!(settings.cart.max_quantity, 10);
    }

    #[test]
    fn default_currency_fallback_rates() {
        let settings = Settings::default();
        assert_eq!(settings.currency.default_buy, 3.387);
        assert_eq!(settings.currency.default_sell, 3.396);
        assert_eq!(settings.currency.ttl_secs, 43_200);
    }

    #[test]
    fn default_catalog_limits() {
        let settings = Settings::default();
        assert_eq!(settings.catalog.max_results, 40);
        assert_eq!(settings.catalog.max_start_index, 1000);
        assert!(settings.catalog.bookstore_base_url.is_none());
    }

    #[test]
    fn partial_section_keeps_field_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                "[cart]\nshipping_fee = 7.5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();
        assert_eq!(settings.cart.shipping_fee, 7.5);
        assert_eq!(settings.cart.max_quantity, 10);
        assert!(settings.checkout.require_auth);
        assert_eq!(settings.session.idle_timeout_secs, 7200);
    }
}
