//! Error types for the Logstack Exporter
//!
//! Scrape-cycle failures are recoverable and live in `contracts`; the errors
//! here are the ones that stop the process at startup or surface from the
//! outer surfaces (config files, client construction, metric registration).

use thiserror::Error;

use crate::client::BackendError;

/// Main error type for exporter setup and I/O
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The search backend client could not be built or reached
    #[error("Client error: {0}")]
    Client(String),

    /// File access or I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metric registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Config file watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl ExporterError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ExporterError::Config(msg.into())
    }

    /// Create a client error
    pub fn client(msg: impl Into<String>) -> Self {
        ExporterError::Client(msg.into())
    }

    /// Whether the operator has to fix the configuration (vs. the environment)
    pub fn is_config_error(&self) -> bool {
        matches!(self, ExporterError::Config(_))
    }
}

impl From<BackendError> for ExporterError {
    fn from(err: BackendError) -> Self {
        ExporterError::Client(err.to_string())
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        ExporterError::Config(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ExporterError {
    fn from(err: serde_yaml::Error) -> Self {
        ExporterError::Config(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for ExporterError {
    fn from(err: toml::de::Error) -> Self {
        ExporterError::Config(format!("TOML error: {}", err))
    }
}

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;
