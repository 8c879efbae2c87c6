//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
use classroom_core::identity::validate_pin;
use classroom_core::SubmissionPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// The `DATABASE_URL` value that selects the in-process store.
pub const MEMORY_DATABASE_URL: &str = "memory";

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
    pub database_url: String,
    pub log_level: Level,
    /// Tenant id stamped on every stored row.
    pub app_id: String,
    pub reference_tz: Tz,
    pub roster_path: PathBuf,
    pub submission_policy: SubmissionPolicy,
    pub instructor_label: String,
    pub question_max_chars: usize,
    pub auth_session_days: i64,
    /// Deprecated: prefer registering the Administrator PIN through the API.
    pub admin_static_pin: Option<String>,
    pub cors_origin: String,
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

/// An empty value counts as unset; anything else must be a usable PIN.
fn static_pin(raw: Option<String>) -> Result<Option<String>, ConfigError> {
    match raw.filter(|pin| !pin.is_empty()) {
        Some(pin) => {
            validate_pin(&pin)
                .map_err(|e| ConfigError::InvalidValue("ADMIN_STATIC_PIN".to_string(), e.to_string()))?;
            Ok(Some(pin))
        }
        None => Ok(None),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Classroom Settings ---
        let app_id = std::env::var("APP_ID").unwrap_or_else(|_| "classroom-pulse".to_string());
        let reference_tz: Tz = parse_var("REFERENCE_TZ", "America/Los_Angeles")?;
        let roster_path = std::env::var("ROSTER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./roster.json"));
        let submission_policy: SubmissionPolicy =
            parse_var("SUBMISSION_POLICY", "no_future_dates")?;
        let instructor_label =
            std::env::var("INSTRUCTOR_LABEL").unwrap_or_else(|_| "Professor".to_string());

        let question_max_chars: usize = parse_var("QUESTION_MAX_CHARS", "1200")?;
        if question_max_chars == 0 {
            return Err(ConfigError::InvalidValue(
                "QUESTION_MAX_CHARS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let auth_session_days: i64 = parse_var("AUTH_SESSION_DAYS", "30")?;
        if auth_session_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "AUTH_SESSION_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let admin_static_pin = static_pin(std::env::var("ADMIN_STATIC_PIN").ok())?;
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            app_id,
            reference_tz,
            roster_path,
            submission_policy,
            instructor_label,
            question_max_chars,
            auth_session_days,
            admin_static_pin,
            cors_origin,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}
