//! Error types for context operations

use thiserror::Error;

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("poll loop '{name}' has a zero interval")]
    InvalidPreset { name: String },

    #[error("default interval must be greater than zero")]
    InvalidDefaultInterval,
}
