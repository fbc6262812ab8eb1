//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// The run was abandoned through its cancel token
    #[error("Run cancelled")]
    Cancelled,

    /// The OS entropy source could not be read
    #[error("Entropy error: {0}")]
    Entropy(String),
}

impl EnvError {
    /// Creates an entropy error.
    pub fn entropy(msg: impl std::fmt::Display) -> Self {
        Self::Entropy(msg.to_string())
    }
}
