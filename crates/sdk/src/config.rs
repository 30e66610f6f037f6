//! Configuration types for the agentkit SDK.

use agentkit_core::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_CONFIG_FILE: &str = "agentkit.toml";
pub const DEFAULT_CLI: &str = "claude";

/// API credential for the model provider.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> AgentResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Configuration(format!("{} is empty", API_KEY_VAR)));
        }
        Ok(Self { api_key })
    }

    /// Load from the process environment, reading a `.env` file first if present.
    pub fn from_env() -> AgentResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
            AgentError::Configuration(format!(
                "{} is not set. Create a .env file with: {}=your-api-key",
                API_KEY_VAR, API_KEY_VAR
            ))
        })?;
        Self::new(api_key)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Client settings, loadable from `agentkit.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Agent CLI executable.
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,
    /// Overall deadline for one query, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_cli_path() -> PathBuf {
    PathBuf::from(DEFAULT_CLI)
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load a config file if it exists, otherwise use defaults.
    pub fn load(path: &Path) -> AgentResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            AgentError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Initial backoff, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff, in milliseconds.
    pub max_backoff_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculate backoff duration after the given (zero-based) failed attempt.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, Duration::from_millis(self.max_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy {
            max_backoff_ms: 500,
            ..Default::default()
        };
        assert_eq!(policy.backoff_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff_ms, 1_000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ClientConfig::load(&temp_dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "cli_path = \"/opt/agent/bin/claude\"\n\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.cli_path, PathBuf::from("/opt/agent/bin/claude"));
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 1_000);
    }

    #[test]
    fn test_load_invalid_file_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_blank_credential_rejected() {
        assert!(Credentials::new("   ").is_err());
        let creds = Credentials::new("sk-test").unwrap();
        assert_eq!(creds.api_key(), "sk-test");
        assert!(!format!("{:?}", creds).contains("sk-test"));
    }
}
