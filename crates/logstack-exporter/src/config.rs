//! Scrape configuration
//!
//! `ScrapeConfig` is an immutable value. It is built once from the command
//! line or a config file and replaced wholesale on reload, never edited in
//! place.
//!
//! Config files are YAML, TOML or JSON, picked by extension:
//!
//! ```yaml
//! backend:
//!   url: https://elastic:9200
//!   username: exporter
//!   timeout_secs: 10
//! index: logstash-*
//! message: heartbeat from billing
//! query_mode: range
//! window_secs: 300
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::contracts::QueryMode;
use crate::error::{ExporterError, Result};

/// Environment variable consulted when no username is configured
pub const USERNAME_ENV: &str = "ELASTIC_USERNAME";

/// Environment variable consulted when no password is configured
pub const PASSWORD_ENV: &str = "ELASTIC_PASSWORD";

fn default_timeout_secs() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    300
}

fn default_message_field() -> String {
    "message".to_string()
}

fn default_timestamp_field() -> String {
    "@timestamp".to_string()
}

fn default_processed_field() -> String {
    "logstash_processed_at".to_string()
}

/// Connection settings for the search backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL, e.g. `https://127.0.0.1:9200`
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Skip TLS certificate verification. Insecure, opt-in only.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Deadline for every backend request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: String::new(),
            password: String::new(),
            insecure_skip_verify: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything one scrape needs to know
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub backend: BackendSettings,

    /// Index (or index pattern) to search
    pub index: String,

    /// Message text to match
    pub message: String,

    #[serde(default)]
    pub query_mode: QueryMode,

    /// Trailing window for range mode
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Document field matched against `message`
    #[serde(default = "default_message_field")]
    pub message_field: String,

    /// Event generation time field
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    /// Ingestion time field
    #[serde(default = "default_processed_field")]
    pub processed_field: String,
}

impl ScrapeConfig {
    /// Create a latest-mode config with default field names
    pub fn new(
        url: impl Into<String>,
        index: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            backend: BackendSettings::new(url),
            index: index.into(),
            message: message.into(),
            query_mode: QueryMode::Latest,
            window_secs: default_window_secs(),
            message_field: default_message_field(),
            timestamp_field: default_timestamp_field(),
            processed_field: default_processed_field(),
        }
    }

    /// Switch to range mode over the given trailing window
    pub fn with_range(mut self, window: Duration) -> Self {
        self.query_mode = QueryMode::Range;
        self.window_secs = window.as_secs();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.backend.username = username.into();
        self.backend.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.backend.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_insecure_skip_verify(mut self, insecure: bool) -> Self {
        self.backend.insecure_skip_verify = insecure;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Load a config file, choosing the format by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: ScrapeConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        let config = config.with_env_credentials();
        config.validate()?;
        Ok(config)
    }

    /// Fill empty credentials from `ELASTIC_USERNAME` / `ELASTIC_PASSWORD`
    pub fn with_env_credentials(mut self) -> Self {
        if self.backend.username.is_empty() {
            if let Ok(username) = std::env::var(USERNAME_ENV) {
                self.backend.username = username;
            }
        }
        if self.backend.password.is_empty() {
            if let Ok(password) = std::env::var(PASSWORD_ENV) {
                self.backend.password = password;
            }
        }
        self
    }

    /// Reject configurations that cannot produce a meaningful query
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ExporterError::config(format!(
                "backend url must start with http:// or https://, got '{}'",
                self.backend.url
            )));
        }
        if self.index.trim().is_empty() {
            return Err(ExporterError::config("index must not be empty"));
        }
        if self.message.trim().is_empty() {
            return Err(ExporterError::config("message must not be empty"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ExporterError::config("timeout must be at least one second"));
        }
        if self.query_mode == QueryMode::Range && self.window_secs == 0 {
            return Err(ExporterError::config(
                "window must be at least one second in range mode",
            ));
        }
        for (name, field) in [
            ("message_field", &self.message_field),
            ("timestamp_field", &self.timestamp_field),
            ("processed_field", &self.processed_field),
        ] {
            if field.trim().is_empty() {
                return Err(ExporterError::config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}
