//! Error types for the qbench harness.

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the qbench harness.
#[derive(Error, Debug)]
pub enum Error {
    /// Engine could not be built from a configuration. Fatal for that
    /// configuration's remaining cells; other configurations proceed.
    #[error("Construction error: {config}: {message}")]
    Construction { config: String, message: String },

    /// Query rejected by the engine before streaming began.
    #[error("Submission error: {0}")]
    Submission(String),

    /// Failure mid-stream; rows already delivered remain counted.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Result file could not be written.
    #[error("Serialization error: {path}: {message}")]
    Serialization { path: String, message: String },

    /// Manifest or CLI configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetch capability errors
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),
}

impl Error {
    /// Create a construction error.
    pub fn construction(config: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            config: config.into(),
            message: message.into(),
        }
    }

    /// Create a submission error.
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission(message.into())
    }

    /// Create a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Box::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}
