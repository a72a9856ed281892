use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Strategy used to space out retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay grows by `delay_ms` per retry.
    Linear,
    /// Delay doubles per retry.
    Exponential,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    1000
}

/// Retry settings for non-streaming requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, first try included (defaults to 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds (defaults to 1000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub strategy: RetryStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            strategy: RetryStrategy::Fixed,
        }
    }
}

/// Log output format for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive (e.g. `"memochat_transport=debug"`); overridden by `MEMOCHAT_LOG`.
    #[serde(default)]
    pub level: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_api_prefix() -> String {
    "/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_login_path() -> String {
    "/login".to_string()
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server origin (defaults to `http://127.0.0.1:5000`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path prefix prepended to every endpoint (defaults to `/api`).
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Per-request timeout for non-streaming calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Location of the durable key-value file (defaults to `~/.memochat/storage.json`).
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// Login entry point the application is sent to on session expiry.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            storage_path: None,
            login_path: default_login_path(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from an optional file path, merged with defaults
    /// and `MEMOCHAT_`-prefixed environment variables (`__` separates nested
    /// keys, e.g. `MEMOCHAT_RETRY__MAX_ATTEMPTS=5`). `MEMOCHAT_LOG` is left to
    /// the log filter.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("MEMOCHAT_").split("__").ignore(&["log"]))
            .extract()
    }

    /// Full URL of `endpoint` under the configured origin and prefix.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_end_matches('/');
        if endpoint.starts_with('/') || endpoint.is_empty() {
            format!("{base}{prefix}{endpoint}")
        } else {
            format!("{base}{prefix}/{endpoint}")
        }
    }
}
