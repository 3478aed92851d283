//! Session service configuration.
//!
//! Configuration is loaded from environment variables. The signing secret
//! and the Redis URL are redacted in Debug output.

use base64::{engine::general_purpose, Engine as _};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Minimum signing secret length in bytes (HS256 key strength).
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Default access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 15 * 60;

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Upper bound for either token lifetime (365 days).
pub const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Lowest bcrypt cost accepted.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest bcrypt cost accepted.
pub const MAX_BCRYPT_COST: u32 = 31;

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_REDIS_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Prefix marking a base64-encoded `JWT_SECRET`.
const BASE64_SECRET_PREFIX: &str = "base64:";

/// Where refresh token rotation identifiers are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// Process-local store; entries are lost on restart.
    Memory,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    /// Cookies are only marked `Secure` in production.
    pub fn secure_cookies(self) -> bool {
        self == AppEnv::Production
    }
}

pub struct Config {
    /// HS256 signing secret.
    pub jwt_secret: SecretBox<Vec<u8>>,

    pub access_token_ttl: Duration,

    pub refresh_token_ttl: Duration,

    pub store_backend: StoreBackend,

    /// Redis connection URL. May carry credentials.
    pub redis_url: SecretString,

    /// Upper bound for a single Redis round-trip.
    pub redis_timeout: Duration,

    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    pub app_env: AppEnv,

    /// Origin allowed by CORS, with credentials.
    pub frontend_url: String,

    /// Tolerance for `iat` in the future.
    pub jwt_clock_skew: Duration,

    pub bcrypt_cost: u32,

    pub request_timeout: Duration,

    /// Time to keep serving after a shutdown signal.
    pub shutdown_drain: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("store_backend", &self.store_backend)
            .field("redis_url", &"[REDACTED]")
            .field("redis_timeout", &self.redis_timeout)
            .field("bind_address", &self.bind_address)
            .field("app_env", &self.app_env)
            .field("frontend_url", &self.frontend_url)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_drain", &self.shutdown_drain)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),

    #[error("Invalid token lifetime configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid store backend: {0}")]
    InvalidStoreBackend(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = parse_jwt_secret(vars)?;

        let access_secs = parse_positive_u64(
            vars,
            "ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidTokenTtl)?;
        let refresh_secs = parse_positive_u64(
            vars,
            "REFRESH_TOKEN_TTL_SECONDS",
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidTokenTtl)?;

        for (name, secs) in [
            ("ACCESS_TOKEN_TTL_SECONDS", access_secs),
            ("REFRESH_TOKEN_TTL_SECONDS", refresh_secs),
        ] {
            if secs > MAX_TOKEN_TTL_SECONDS {
                return Err(ConfigError::InvalidTokenTtl(format!(
                    "{name} ({secs}) must be at most {MAX_TOKEN_TTL_SECONDS}"
                )));
            }
        }

        if refresh_secs <= access_secs {
            return Err(ConfigError::InvalidTokenTtl(format!(
                "REFRESH_TOKEN_TTL_SECONDS ({refresh_secs}) must exceed ACCESS_TOKEN_TTL_SECONDS ({access_secs})"
            )));
        }

        let store_backend = match vars.get("STORE_BACKEND").map(|s| s.trim().to_ascii_lowercase()) {
            None => StoreBackend::Redis,
            Some(value) if value == "redis" => StoreBackend::Redis,
            Some(value) if value == "memory" => StoreBackend::Memory,
            Some(value) => {
                return Err(ConfigError::InvalidStoreBackend(format!(
                    "STORE_BACKEND must be 'redis' or 'memory', got '{value}'"
                )))
            }
        };

        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        );

        let redis_timeout_ms = parse_positive_u64(vars, "REDIS_TIMEOUT_MS", DEFAULT_REDIS_TIMEOUT_MS)
            .map_err(|reason| invalid("REDIS_TIMEOUT_MS", reason))?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let app_env = match vars.get("APP_ENV").map(String::as_str) {
            Some("production") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let frontend_url = vars
            .get("FRONTEND_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_secs =
            parse_positive_u64(vars, "JWT_CLOCK_SKEW_SECONDS", DEFAULT_CLOCK_SKEW.as_secs())
                .map_err(ConfigError::InvalidJwtClockSkew)?;
        if jwt_clock_skew_secs > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::InvalidJwtClockSkew(format!(
                "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                jwt_clock_skew_secs
            )));
        }

        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{value_str}': {e}"
                ))
            })?;
            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}, got {value}"
                )));
            }
            value
        } else {
            DEFAULT_BCRYPT_COST
        };

        let request_timeout_secs = parse_positive_u64(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )
        .map_err(|reason| invalid("REQUEST_TIMEOUT_SECONDS", reason))?;

        let shutdown_drain_secs = match vars.get("SHUTDOWN_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse::<u64>().map_err(|e| {
                invalid(
                    "SHUTDOWN_DRAIN_SECONDS",
                    format!("must be a valid integer, got '{value_str}': {e}"),
                )
            })?,
            None => 0,
        };

        Ok(Config {
            jwt_secret,
            access_token_ttl: Duration::from_secs(access_secs),
            refresh_token_ttl: Duration::from_secs(refresh_secs),
            store_backend,
            redis_url,
            redis_timeout: Duration::from_millis(redis_timeout_ms),
            bind_address,
            app_env,
            frontend_url,
            jwt_clock_skew: Duration::from_secs(jwt_clock_skew_secs),
            bcrypt_cost,
            request_timeout: Duration::from_secs(request_timeout_secs),
            shutdown_drain: Duration::from_secs(shutdown_drain_secs),
        })
    }

    /// Length of the signing secret in bytes.
    pub fn jwt_secret_len(&self) -> usize {
        self.jwt_secret.expose_secret().len()
    }
}

/// `JWT_SECRET` is taken as raw UTF-8 bytes, or decoded when it starts
/// with `base64:`.
fn parse_jwt_secret(vars: &HashMap<String, String>) -> Result<SecretBox<Vec<u8>>, ConfigError> {
    let raw = vars
        .get("JWT_SECRET")
        .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;

    let bytes = match raw.strip_prefix(BASE64_SECRET_PREFIX) {
        Some(encoded) => general_purpose::STANDARD.decode(encoded).map_err(|e| {
            ConfigError::InvalidJwtSecret(format!("base64 decode failed: {e}"))
        })?,
        None => raw.as_bytes().to_vec(),
    };

    if bytes.len() < MIN_JWT_SECRET_BYTES {
        return Err(ConfigError::InvalidJwtSecret(format!(
            "Expected at least {MIN_JWT_SECRET_BYTES} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(SecretBox::new(Box::new(bytes)))
}

fn parse_positive_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, String> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str
        .parse()
        .map_err(|e| format!("{name} must be a valid positive integer, got '{value_str}': {e}"))?;

    if value == 0 {
        return Err(format!("{name} must be greater than 0"));
    }

    Ok(value)
}

fn invalid(name: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason,
    }
}
