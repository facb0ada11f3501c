//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LEARNFRONT_BASE_URL` - Public URL for the storefront
//! - `BACKEND_URL` - Course/order backend API root (e.g., `https://host/api`)
//! - `FLUTTERWAVE_PUBLIC_KEY` - Payment widget public key (`FLWPUBK...`)
//!
//! ## Optional
//! - `LEARNFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `LEARNFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_API_KEY` - Bearer token for the backend
//! - `BACKEND_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `CATALOG_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `FLUTTERWAVE_PAYMENT_OPTIONS` - Widget payment options (default: card,mobilemoney,ussd)
//! - `CHECKOUT_LOGO_URL` - Logo shown inside the payment widget
//! - `CHECKOUT_REDIRECT_URL` - Where buyers land after a successful payment (default: /)
//! - `CHECKOUT_REDIRECT_DELAY_SECS` - Delay before that redirect (default: 5)
//! - `CHECKOUT_ATTEMPT_TTL_SECS` - How long an unanswered payment attempt is kept (default: 1800)
//! - `CHECKOUT_LATE_CALLBACK_SECS` - How long a successful callback for an expired attempt is still recorded (default: 86400)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const PUBLIC_KEY_PREFIX: &str = "FLWPUBK";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Course/order backend connection
    pub backend: BackendConfig,
    /// Payment widget settings
    pub payment: PaymentWidgetSettings,
    /// Checkout flow tuning
    pub checkout: CheckoutSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend API configuration. Shared with the CLI.
#[derive(Clone)]
pub struct BackendConfig {
    /// API root; resource paths are appended to it.
    pub base_url: Url,
    /// Optional bearer token.
    pub api_key: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Lifetime of cached catalog reads.
    pub cache_ttl: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Payment widget settings (Flutterwave inline checkout).
#[derive(Debug, Clone)]
pub struct PaymentWidgetSettings {
    /// Public key; safe to expose in the browser.
    pub public_key: String,
    /// Comma-separated payment options offered by the widget.
    pub payment_options: String,
    /// Logo shown in the widget header.
    pub logo_url: Option<String>,
}

/// Checkout flow settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Redirect target after a successful payment.
    pub redirect_url: String,
    /// Delay before the automatic redirect.
    pub redirect_delay: Duration,
    /// How long a payment attempt waits for its callback.
    pub attempt_ttl: Duration,
    /// How long after expiry a successful callback is still recorded.
    pub late_callback_window: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            redirect_url: "/".to_string(),
            redirect_delay: Duration::from_secs(5),
            attempt_ttl: Duration::from_secs(30 * 60),
            late_callback_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the backend API key fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_parsed_or_default::<IpAddr>("LEARNFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("LEARNFRONT_PORT", "3000")?;
        let base_url = get_required_env("LEARNFRONT_BASE_URL")?;

        Ok(Self {
            host,
            port,
            base_url,
            backend: BackendConfig::from_env()?,
            payment: PaymentWidgetSettings::from_env()?,
            checkout: CheckoutSettings::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendConfig {
    /// Load the backend settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `BACKEND_URL` is missing or not an absolute
    /// URL, a duration is not a whole number of seconds, or the API key looks
    /// like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let raw_url = get_required_env("BACKEND_URL")?;
        let base_url = parse_backend_url(&raw_url)?;

        let api_key = get_optional_env("BACKEND_API_KEY")
            .map(|key| {
                validate_secret_strength(&key, "BACKEND_API_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(key))
            })
            .transpose()?;

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(get_parsed_or_default("BACKEND_TIMEOUT_SECS", "15")?),
            cache_ttl: Duration::from_secs(get_parsed_or_default("CATALOG_CACHE_TTL_SECS", "300")?),
        })
    }

    /// Returns the API key, if any, for use in an `Authorization` header.
    #[must_use]
    pub fn exposed_api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(ExposeSecret::expose_secret)
    }
}

impl PaymentWidgetSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let public_key = get_required_env("FLUTTERWAVE_PUBLIC_KEY")?;
        validate_public_key(&public_key)?;

        Ok(Self {
            public_key,
            payment_options: get_env_or_default(
                "FLUTTERWAVE_PAYMENT_OPTIONS",
                "card,mobilemoney,ussd",
            ),
            logo_url: get_optional_env("CHECKOUT_LOGO_URL"),
        })
    }
}

impl CheckoutSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            redirect_url: get_env_or_default("CHECKOUT_REDIRECT_URL", "/"),
            redirect_delay: Duration::from_secs(get_parsed_or_default(
                "CHECKOUT_REDIRECT_DELAY_SECS",
                "5",
            )?),
            attempt_ttl: Duration::from_secs(get_parsed_or_default(
                "CHECKOUT_ATTEMPT_TTL_SECS",
                "1800",
            )?),
            late_callback_window: Duration::from_secs(get_parsed_or_default(
                "CHECKOUT_LATE_CALLBACK_SECS",
                "86400",
            )?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable parsed into `T`, falling back to `default`.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse and sanity-check the backend API root.
fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_URL".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "BACKEND_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

/// The widget refuses to load without a public key, so fail at startup.
fn validate_public_key(key: &str) -> Result<(), ConfigError> {
    if !key.starts_with(PUBLIC_KEY_PREFIX) {
        return Err(ConfigError::InvalidEnvVar(
            "FLUTTERWAVE_PUBLIC_KEY".to_string(),
            format!("must start with {PUBLIC_KEY_PREFIX}"),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-api-key-here", "K"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "K").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "K").is_ok());
    }

    #[test]
    fn test_public_key_prefix() {
        assert!(validate_public_key("FLWPUBK_TEST-8fd1-X").is_ok());
        assert!(validate_public_key("pk_live_123").is_err());
        assert!(validate_public_key("").is_err());
    }

    #[test]
    fn test_backend_url_must_be_http_base() {
        assert!(parse_backend_url("https://backend.example.com/api").is_ok());
        assert!(parse_backend_url("http://127.0.0.1:4000").is_ok());
        assert!(parse_backend_url("mailto:ops@example.com").is_err());
        assert!(parse_backend_url("ftp://files.example.com").is_err());
        assert!(parse_backend_url("not a url").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            backend: BackendConfig {
                base_url: Url::parse("http://localhost:4000/api").unwrap(),
                api_key: None,
                timeout: Duration::from_secs(15),
                cache_ttl: Duration::from_secs(300),
            },
            payment: PaymentWidgetSettings {
                public_key: "FLWPUBK_TEST-abc-X".to_string(),
                payment_options: "card".to_string(),
                logo_url: None,
            },
            checkout: CheckoutSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_backend_config_debug_redacts_api_key() {
        let config = BackendConfig {
            base_url: Url::parse("https://backend.example.com/api").unwrap(),
            api_key: Some(SecretString::from("super_secret_backend_key")),
            timeout: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(300),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("backend.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_backend_key"));
    }
}
