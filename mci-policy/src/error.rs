//! Policy errors.

use thiserror::Error;

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors surfaced by path policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The candidate path lies outside every allowed directory.
    #[error(
        "File path access outside context directory and allow-list is not allowed unless enableAnyPaths is true. Path: {path}"
    )]
    OutsideAllowedDirectories {
        /// Path as supplied by the caller.
        path: String,
    },

    /// The context directory could not be turned into an absolute path.
    #[error("invalid context directory `{path}`: {reason}")]
    InvalidContextDir {
        /// Directory as supplied.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}

impl PolicyError {
    /// Convenience constructor for denied paths.
    #[must_use]
    pub fn outside(path: impl Into<String>) -> Self {
        Self::OutsideAllowedDirectories { path: path.into() }
    }
}
