//! Error types for Vantage

use thiserror::Error;

/// Main error type for Vantage operations
#[derive(Debug, Error)]
pub enum VantageError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Server error: {0}")]
    ServerError(#[from] hyper::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid submission: {}", .0.join("; "))]
    ValidationError(Vec<String>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Scan cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Rate limited by target")]
    RateLimitExceeded,

    #[error("Audit timeout after {0} seconds")]
    AuditTimeout(u64),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("Queue closed")]
    QueueClosed,
}

impl VantageError {
    /// Shorthand for a single-field validation failure
    pub fn invalid(message: impl Into<String>) -> Self {
        VantageError::ValidationError(vec![message.into()])
    }
}

/// Result type alias for Vantage operations
pub type Result<T> = std::result::Result<T, VantageError>;
