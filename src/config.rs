//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the local record database.
    pub db_path: PathBuf,
    /// Bound on the remote intent classification call.
    pub remote_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/docflow.db"),
            remote_timeout: crate::classify::DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Build config from environment variables, defaulting anything unset.
    ///
    /// A variable that is set but unparseable is an error, not a silent
    /// fallback to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("DOCFLOW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let remote_timeout = match std::env::var("DOCFLOW_REMOTE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "DOCFLOW_REMOTE_TIMEOUT_SECS".into(),
                    message: format!("expected a number of seconds, got {raw:?}"),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => defaults.remote_timeout,
        };

        Ok(Self {
            db_path,
            remote_timeout,
        })
    }
}

/// Remote intent API configuration.
#[derive(Clone)]
pub struct IntentApiConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Override for the chat-completions base URL.
    pub base_url: Option<String>,
}

impl IntentApiConfig {
    /// Build config from environment variables.
    /// Returns `None` if `OPENROUTER_API_KEY` is not set (remote intent
    /// classification disabled; the pipeline runs heuristics-only).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").ok()?;

        let model = std::env::var("OPENROUTER_MODEL")
            .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let base_url = std::env::var("OPENROUTER_BASE_URL").ok();

        Some(Self {
            api_key: SecretString::from(api_key),
            model,
            base_url,
        })
    }
}
