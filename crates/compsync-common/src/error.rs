//! Error types for compsync

use thiserror::Error;

/// Result type alias for compsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for compsync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The source file is missing, unreadable or not tabular
    #[error("Failed to load '{path}': {message}")]
    Load { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A date-only value could not be parsed as a calendar date
    #[error("Unrecognised date: '{value}'")]
    DateParse { value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The remote endpoint rejected a batch
    #[error("Batch {start}..{end} rejected (status {status}): {body}")]
    Upload {
        start: usize,
        end: usize,
        status: u16,
        body: String,
    },
}

impl SyncError {
    /// Create a load error for the given path
    pub fn load(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Whether this error should stop the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DateParse { .. } | Self::Upload { .. })
    }
}
