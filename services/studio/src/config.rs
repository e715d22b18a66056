//! services/studio/src/config.rs
//!
//! Defines the service configuration and how it is loaded.
//!
//! All configuration comes from environment variables at startup. The `.env`
//! file is used for local development.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use arunika_core::domain::RemoteConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cache_dir: PathBuf,
    pub cache_quota_bytes: usize,
    /// Credentials used until the admin stores their own.
    pub remote: RemoteConfig,
    pub remote_timeout: Duration,
    pub run_migrations: bool,
    pub sync_debounce: Duration,
    pub echo_window: Duration,
    pub admin_username: String,
    /// PHC-formatted argon2 hash of the admin password.
    pub admin_password_hash: String,
    pub public_base_url: String,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Local cache ---
        let cache_dir = std::env::var("LOCAL_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.arunika"));
        let cache_quota_bytes = parse_var("LOCAL_CACHE_QUOTA_BYTES", "5242880")?;

        // --- Remote store ---
        let remote = RemoteConfig::new(
            std::env::var("REMOTE_ENDPOINT_URL").unwrap_or_default(),
            std::env::var("REMOTE_API_KEY").unwrap_or_default(),
        );
        let remote_timeout = Duration::from_secs(parse_var("REMOTE_TIMEOUT_SECS", "10")?);
        let run_migrations = parse_var("RUN_MIGRATIONS", "false")?;

        // --- Sync ---
        let sync_debounce = Duration::from_millis(parse_var("SYNC_DEBOUNCE_MS", "1000")?);
        let echo_window = Duration::from_millis(parse_var("ECHO_WINDOW_MS", "2500")?);

        // --- Admin login ---
        let admin_username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password_hash = match std::env::var("ADMIN_PASSWORD_HASH") {
            Ok(hash) => hash,
            Err(_) => {
                let password = std::env::var("ADMIN_PASSWORD")
                    .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD_HASH".to_string()))?;
                hash_password(&password)?
            }
        };

        // --- View ---
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173/".to_string());
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            log_level,
            cache_dir,
            cache_quota_bytes,
            remote,
            remote_timeout,
            run_migrations,
            sync_debounce,
            echo_window,
            admin_username,
            admin_password_hash,
            public_base_url,
            cors_origin,
        })
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

/// Hashes a plain-text admin password into PHC format.
pub fn hash_password(password: &str) -> Result<String, ConfigError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ConfigError::InvalidValue("ADMIN_PASSWORD".to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_reports_the_variable_name() {
        let err = parse_var::<u64>("ARUNIKA_TEST_UNSET_NUMBER", "not-a-number").unwrap_err();
        assert!(err.to_string().contains("ARUNIKA_TEST_UNSET_NUMBER"));
        assert_eq!(parse_var::<u64>("ARUNIKA_TEST_UNSET_NUMBER", "42").unwrap(), 42);
    }

    #[test]
    fn hashed_password_is_phc_argon2() {
        let hash = hash_password("secret").unwrap();
        assert!(hash.starts_with("$argon2"));
    }
}
