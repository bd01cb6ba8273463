//! Runtime configuration
//!
//! Read once from the environment at startup, with defaults that match a
//! local extraction API. Every knob has a working default, so an empty
//! environment is a valid configuration.

use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:1323";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the extraction API
    pub api_url: String,
    /// Model used when none is selected explicitly
    pub default_model: String,
    /// End-to-end timeout for an extraction request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            default_model: crate::models::default_model().id.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Build from the environment, falling back to defaults for anything
    /// unset or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            default_model: env::var("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}
