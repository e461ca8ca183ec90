// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildlaneError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The interpreter or launcher artifact could not be started.
    #[error("Launch error: {0}")]
    LaunchError(String),

    /// The subprocess pipe broke, closed early, or stopped answering.
    #[error("Communication error: {message}")]
    CommunicationError {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Coordinator has been disposed")]
    Disposed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildlaneError {
    pub fn communication(message: impl Into<String>) -> Self {
        BuildlaneError::CommunicationError {
            message: message.into(),
            source: None,
        }
    }

    pub fn communication_io(message: impl Into<String>, source: std::io::Error) -> Self {
        BuildlaneError::CommunicationError {
            message: message.into(),
            source: Some(source),
        }
    }

    /// True for errors raised while talking to a running subprocess.
    pub fn is_communication(&self) -> bool {
        matches!(self, BuildlaneError::CommunicationError { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildlaneError>;
