//! Error types for factprobe.

use thiserror::Error;

/// Result type for factprobe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for factprobe operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Run configuration rejected before any work started.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset loading/parsing error.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// An object label that passed filtering cannot be resolved to a single
    /// vocabulary entry at scoring time.
    #[error("object label {label} {reason}")]
    VocabularyMismatch {
        /// The offending object label
        label: String,
        /// What failed to resolve
        reason: String,
    },

    /// Input the pipeline cannot produce a meaningful result from.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Model inference failed or returned inconsistent shapes.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a dataset error.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Error::Dataset(msg.into())
    }

    /// Create a vocabulary mismatch error for `label`.
    pub fn vocabulary_mismatch(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::VocabularyMismatch {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create a degenerate input error.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::DegenerateInput(msg.into())
    }

    /// Create an inference error.
    pub fn inference(msg: impl Into<String>) -> Self {
        Error::Inference(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_mismatch_names_label() {
        let err = Error::vocabulary_mismatch("Paris", "not in model vocabulary");
        assert_eq!(err.to_string(), "object label Paris not in model vocabulary");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
