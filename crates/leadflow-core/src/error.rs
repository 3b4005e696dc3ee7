//! Leadflow error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeadflowError>;

#[derive(Debug, Error)]
pub enum LeadflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    /// Upstream quota exhausted. Callers stop the batch and retry next run.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Skip-trace error: {0}")]
    SkipTrace(String),

    #[error("Send error: {0}")]
    Send(String),

    #[error("Lead source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LeadflowError {
    /// Transient failures leave the record untouched so the next run retries it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }

    pub fn missing_column(table: &str, column: &str) -> Self {
        Self::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
