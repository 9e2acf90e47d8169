//! services/evaluator/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use grading_core::evaluation::DEFAULT_MODEL;

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
    pub log_level: Level,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub grading_model: String,
    pub oracle_timeout: Duration,
    pub oracle_hourly_limit: u32,
    pub oracle_daily_limit: u32,
    pub daily_budget_usd: f64,
    pub prune_interval: Duration,
    pub app_referer: String,
    pub app_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            openrouter_api_key: None,
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            grading_model: DEFAULT_MODEL.to_string(),
            oracle_timeout: Duration::from_secs(60),
            oracle_hourly_limit: 10,
            oracle_daily_limit: 50,
            daily_budget_usd: 20.0,
            prune_interval: Duration::from_secs(5 * 60),
            app_referer: "http://localhost:3000".to_string(),
            app_title: "Problem Bank Evaluator".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Oracle Settings ---
        let openrouter_api_key = lookup("OPENROUTER_API_KEY").filter(|key| !key.trim().is_empty());
        let openrouter_base_url = lookup("OPENROUTER_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.openrouter_base_url);
        let grading_model = lookup("GRADING_MODEL").unwrap_or(defaults.grading_model);
        let oracle_timeout = parse_var::<u64, _>(&lookup, "ORACLE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.oracle_timeout);

        // --- Cost Controls ---
        let oracle_hourly_limit =
            parse_var(&lookup, "ORACLE_HOURLY_LIMIT")?.unwrap_or(defaults.oracle_hourly_limit);
        let oracle_daily_limit =
            parse_var(&lookup, "ORACLE_DAILY_LIMIT")?.unwrap_or(defaults.oracle_daily_limit);
        let daily_budget_usd =
            parse_var(&lookup, "LLM_DAILY_BUDGET_USD")?.unwrap_or(defaults.daily_budget_usd);
        let prune_interval = parse_var::<u64, _>(&lookup, "PRUNE_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.prune_interval);

        // --- Attribution Headers ---
        let app_referer = lookup("APP_REFERER").unwrap_or(defaults.app_referer);
        let app_title = lookup("APP_TITLE").unwrap_or(defaults.app_title);

        Ok(Self {
            log_level,
            openrouter_api_key,
            openrouter_base_url,
            grading_model,
            oracle_timeout,
            oracle_hourly_limit,
            oracle_daily_limit,
            daily_budget_usd,
            prune_interval,
            app_referer,
            app_title,
        })
    }

    /// The API key, required for anything that talks to the oracle.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openrouter_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENROUTER_API_KEY".to_string()))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
