// src/error.rs
use std::io;
use thiserror::Error;

/// Result type used across the exporter
pub type Result<T> = std::result::Result<T, MetricError>;

/// Custom Error type for the exporter
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot classify rule {rule}: {reason}")]
    Classification { rule: String, reason: String },

    #[error("Cannot register rule {rule}: {reason}")]
    Registration { rule: String, reason: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl MetricError {
    pub fn classification(rule: &str, reason: impl Into<String>) -> Self {
        MetricError::Classification {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }

    pub fn registration(rule: &str, reason: impl ToString) -> Self {
        MetricError::Registration {
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }
}
