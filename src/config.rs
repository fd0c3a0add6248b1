//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::subscription::MAX_CHECK_INTERVAL_MINUTES;
use crate::services::ReconcileSettings;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Social media API base URL
    pub social_api_base_url: String,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Polling ---
    /// Minutes between scheduled sweeps
    pub sweep_interval_minutes: u64,
    /// Upper bound for each remote call
    pub fetch_timeout_secs: u64,
    /// Page size requested from the social API
    pub max_results_per_fetch: u32,
    /// Outbound request budget shared by all polling
    pub source_requests_per_minute: u32,

    // --- Secrets ---
    /// App bearer token for the social media API
    pub social_api_bearer_token: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            social_api_base_url: "http://localhost:9999/2".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            sweep_interval_minutes: 15,
            fetch_timeout_secs: 15,
            max_results_per_fetch: 20,
            source_requests_per_minute: 30,
            social_api_bearer_token: "test_bearer_token".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            social_api_base_url: env::var("SOCIAL_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.twitter.com/2".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,

            sweep_interval_minutes: parse_or("SWEEP_INTERVAL_MINUTES", 15)?,
            fetch_timeout_secs: parse_or("FETCH_TIMEOUT_SECS", 15)?,
            max_results_per_fetch: parse_or("MAX_RESULTS_PER_FETCH", 20)?,
            source_requests_per_minute: parse_or("SOURCE_REQUESTS_PER_MINUTE", 30)?,

            social_api_bearer_token: env::var("SOCIAL_API_BEARER_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SOCIAL_API_BEARER_TOKEN"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Sweep period, kept within one minute and the longest check interval.
    pub fn sweep_interval(&self) -> Duration {
        let minutes = self
            .sweep_interval_minutes
            .clamp(1, u64::from(MAX_CHECK_INTERVAL_MINUTES));
        Duration::from_secs(minutes * 60)
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            max_results: self.max_results_per_fetch,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
