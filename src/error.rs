//! Error types for MAPnet.
//!
//! Uses thiserror for ergonomic error definitions. Configuration and
//! missing-artifact errors are produced before any compute begins; compute
//! and filesystem failures propagate uncaught and abort the run.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for MAPnet operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed hyperparameter vectors, non-positive frequency intervals,
    /// and other invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A requested load path does not exist
    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Model error
    #[error("Model error: {0}")]
    Model(String),

    /// Training error
    #[error("Training error: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Dataset(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Specialized Result type for MAPnet operations.
pub type Result<T> = std::result::Result<T, Error>;
