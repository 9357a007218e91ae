//! Error types shared across the report grid crates

use thiserror::Error;

use crate::settings::ViewId;

/// Result alias used throughout the grid crates
pub type GridResult<T> = Result<T, GridError>;

/// Errors that can occur while coordinating views and report settings
#[derive(Error, Debug)]
pub enum GridError {
    /// Missing or inconsistent startup configuration. Raised at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A view id that no registered view answers to
    #[error("Unknown view: '{0}'")]
    UnknownView(ViewId),

    /// A settings item or column reference that does not resolve
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// A settings item failed validation; sync was not attempted
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote settings store could not be reached or rejected the call
    #[error("Settings sync failed: {0}")]
    Transport(#[source] anyhow::Error),

    /// The record model collaborator failed
    #[error("Model error: {0}")]
    Model(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// Whether the error means the component cannot be constructed at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, GridError::Config(_) | GridError::UnknownView(_))
    }
}
