//! Server configuration.
//!
//! Loaded from environment variables, with an optional `.env` file read
//! first. Unset values fall back to development-friendly defaults; values
//! that are set but malformed are errors.

use crate::identity::{IdentityError, VendorTokens};
use eventday_core::{CodeExposure, DEFAULT_OTP_TTL_SECS};
use eventday_providers::cloudinary::normalize_credential;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },

    /// `VENDOR_TOKENS` is malformed.
    #[error("Invalid VENDOR_TOKENS: {0}")]
    Identity(#[from] IdentityError),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Record storage
    pub storage: StorageConfig,
    /// Cloudinary credentials, if any
    pub images: ImageConfig,
    /// SMTP settings, if any
    pub notifier: NotifierConfig,
    /// Bearer tokens
    pub vendors: VendorTokens,
    /// OTP validity window
    pub otp_ttl: chrono::Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// `development` or `production`
    pub environment: String,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Prometheus scrape port; metrics are off when unset
    pub metrics_port: Option<u16>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Whether OTP codes appear in responses.
    #[must_use]
    pub fn code_exposure(&self) -> CodeExposure {
        if self.environment.eq_ignore_ascii_case("development") {
            CodeExposure::Revealed
        } else {
            CodeExposure::Hidden
        }
    }

    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `PostgreSQL` URL; in-memory storage when unset
    pub database_url: Option<String>,
    /// Maximum pool size
    pub max_connections: u32,
}

/// Cloudinary configuration
#[derive(Clone)]
pub struct ImageConfig {
    /// Cloud name
    pub cloud_name: Option<String>,
    /// API key
    pub api_key: Option<String>,
    /// API secret
    pub api_secret: Option<String>,
    /// Folder prefix
    pub folder_root: String,
    /// Per-upload timeout
    pub upload_timeout: Duration,
}

impl std::fmt::Debug for ImageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("folder_root", &self.folder_root)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

impl ImageConfig {
    /// All three credentials, when every one is present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.cloud_name, &self.api_key, &self.api_secret) {
            (Some(cloud), Some(key), Some(secret)) => Some((cloud, key, secret)),
            _ => None,
        }
    }
}

/// SMTP configuration
#[derive(Clone)]
pub struct NotifierConfig {
    /// Relay host; console delivery when unset
    pub smtp_host: Option<String>,
    /// Relay port
    pub smtp_port: u16,
    /// Login user
    pub smtp_username: String,
    /// Login password
    pub smtp_password: String,
    /// Sender address
    pub smtp_from: String,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_from", &self.smtp_from)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env`
    /// first if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(ToString::to_string)
            .collect();
        if let Some(client_url) = var("CLIENT_URL") {
            if !cors_origins.contains(&client_url) {
                cors_origins.push(client_url);
            }
        }

        let server = ServerConfig {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&var, "PORT")?.unwrap_or(5000),
            environment: var("APP_ENV").unwrap_or_else(|| "production".to_string()),
            cors_origins,
            metrics_port: parse(&var, "METRICS_PORT")?,
            shutdown_timeout: Duration::from_secs(
                parse(&var, "SHUTDOWN_TIMEOUT_SECS")?.unwrap_or(30),
            ),
        };

        let storage = StorageConfig {
            database_url: var("DATABASE_URL"),
            max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
        };

        let credential = |name: &str| {
            var(name)
                .map(|v| normalize_credential(&v))
                .filter(|v| !v.is_empty())
        };
        let images = ImageConfig {
            cloud_name: credential("CLOUDINARY_CLOUD_NAME"),
            api_key: credential("CLOUDINARY_API_KEY"),
            api_secret: credential("CLOUDINARY_API_SECRET"),
            folder_root: var("IMAGE_FOLDER_ROOT").unwrap_or_else(|| "zappy".to_string()),
            upload_timeout: Duration::from_secs(
                parse(&var, "IMAGE_UPLOAD_TIMEOUT_SECS")?.unwrap_or(30),
            ),
        };

        let notifier = NotifierConfig {
            smtp_host: var("SMTP_HOST"),
            smtp_port: parse(&var, "SMTP_PORT")?.unwrap_or(587),
            smtp_username: var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from: var("SMTP_FROM")
                .unwrap_or_else(|| "Eventday <no-reply@eventday.local>".to_string()),
        };

        let vendors = match var("VENDOR_TOKENS") {
            Some(raw) => VendorTokens::parse(&raw)?,
            None => VendorTokens::new(),
        };

        let otp_ttl_secs: i64 = parse(&var, "OTP_TTL_SECS")?.unwrap_or(DEFAULT_OTP_TTL_SECS);
        if otp_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "OTP_TTL_SECS",
                value: otp_ttl_secs.to_string(),
            });
        }
        let otp_ttl = chrono::Duration::seconds(otp_ttl_secs);

        Ok(Self {
            server,
            storage,
            images,
            notifier,
            vendors,
            otp_ttl,
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.server.code_exposure(), CodeExposure::Hidden);
        assert_eq!(config.server.metrics_port, None);
        assert!(config.storage.database_url.is_none());
        assert!(config.images.credentials().is_none());
        assert!(config.notifier.smtp_host.is_none());
        assert!(config.vendors.is_empty());
        assert_eq!(config.otp_ttl, chrono::Duration::minutes(10));
    }

    #[test]
    fn client_url_is_appended_once() {
        let config = load(&[
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("CLIENT_URL", "http://b.test"),
        ])
        .unwrap();
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);

        let config = load(&[("CLIENT_URL", "https://app.test")]).unwrap();
        assert_eq!(
            config.server.cors_origins,
            vec!["http://localhost:3000", "https://app.test"]
        );
    }

    #[test]
    fn development_reveals_codes() {
        let config = load(&[("APP_ENV", "Development")]).unwrap();
        assert_eq!(config.server.code_exposure(), CodeExposure::Revealed);
    }

    #[test]
    fn cloudinary_credentials_are_normalised() {
        let config = load(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", " \"123\" "),
            ("CLOUDINARY_API_SECRET", "'shh'"),
        ])
        .unwrap();
        assert_eq!(config.images.credentials(), Some(("demo", "123", "shh")));
        assert!(!format!("{:?}", config.images).contains("shh"));
    }

    #[test]
    fn partial_cloudinary_credentials_are_unconfigured() {
        let config = load(&[("CLOUDINARY_CLOUD_NAME", "demo"), ("CLOUDINARY_API_KEY", "\"\"")])
            .unwrap();
        assert!(config.images.credentials().is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        assert!(load(&[("OTP_TTL_SECS", "0")]).is_err());
    }

    #[test]
    fn vendor_tokens_are_parsed() {
        let config = load(&[(
            "VENDOR_TOKENS",
            "alpha=8f14e45f-ceea-467a-9af1-3d8c8e7a0b11",
        )])
        .unwrap();
        assert_eq!(config.vendors.len(), 1);
        assert!(matches!(
            load(&[("VENDOR_TOKENS", "alpha")]),
            Err(ConfigError::Identity(_))
        ));
    }
}
