//! Shared error definitions for MCI primitives.

use thiserror::Error;

/// Result alias used throughout the MCI crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or validating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The tool name failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A tool definition was structurally unusable.
    #[error("invalid tool definition: {reason}")]
    InvalidDefinition {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A path was rejected by the configured path validator.
    #[error("path access denied for `{path}`: {reason}")]
    PathDenied {
        /// Path as supplied to the validator.
        path: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl Error {
    /// Convenience constructor for path denials.
    #[must_use]
    pub fn path_denied(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathDenied {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
