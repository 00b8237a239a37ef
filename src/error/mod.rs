//! Error types for oauth-desk.

use thiserror::Error;

use crate::auth::AuthError;

/// Top-level error for startup, configuration and command paths.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl DeskError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DeskError>;
