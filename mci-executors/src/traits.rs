//! Shared executor trait, error type and timing helpers.

use std::time::Duration;

use async_trait::async_trait;
use mci_primitives::{Context, ExecutionConfig, ExecutionKind, ExecutionResult};
use mci_templates::TemplateError;
use thiserror::Error;

/// Timeout applied when a config carries zero or a negative value.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Result alias used by executor internals.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Failures raised inside an executor before they are folded into an
/// [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor was handed a config of another kind.
    #[error("invalid config type: expected {expected} config, got {found}")]
    ConfigMismatch {
        /// Kind the executor handles.
        expected: ExecutionKind,
        /// Kind it received.
        found: ExecutionKind,
    },

    /// A templated field failed to render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The path validator rejected a path.
    #[error(transparent)]
    PathDenied(#[from] mci_primitives::Error),

    /// The config is well-typed but unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable reason.
        reason: String,
    },

    /// A file did not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Rendered path.
        path: String,
    },

    /// A path existed but was not a regular file.
    #[error("Path is not a file: {path}")]
    NotAFile {
        /// Rendered path.
        path: String,
    },

    /// Filesystem failure other than a missing file.
    #[error("failed to read `{path}`: {reason}")]
    Io {
        /// Rendered path.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// A subprocess could not be started.
    #[error("failed to start `{command}`: {reason}")]
    Spawn {
        /// Program name.
        command: String,
        /// Underlying error.
        reason: String,
    },

    /// An operation exceeded its timeout.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        /// What was being waited on.
        operation: &'static str,
        /// Applied limit.
        limit: Duration,
    },

    /// Network or protocol failure.
    #[error("transport error: {reason}")]
    Transport {
        /// Underlying error.
        reason: String,
    },

    /// The MCP server name is not registered.
    #[error("MCP server '{name}' not registered")]
    UnknownServer {
        /// Requested server name.
        name: String,
    },

    /// MCP session or tool call failure.
    #[error("MCP error: {reason}")]
    Mcp {
        /// Underlying error.
        reason: String,
    },
}

impl ExecutorError {
    /// Convenience constructor for invalid configuration.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for MCP failures.
    #[must_use]
    pub fn mcp(reason: impl Into<String>) -> Self {
        Self::Mcp {
            reason: reason.into(),
        }
    }

    /// Builds a timeout error from the applied duration.
    #[must_use]
    pub fn timeout(operation: &'static str, limit: Duration) -> Self {
        Self::Timeout { operation, limit }
    }
}

impl From<ExecutorError> for ExecutionResult {
    fn from(err: ExecutorError) -> Self {
        Self::failure(err.to_string())
    }
}

/// Executes one kind of [`ExecutionConfig`].
///
/// Implementations must not panic or return early with an error: every
/// failure is reported through an error [`ExecutionResult`].
#[async_trait]
pub trait Executor: Send + Sync {
    /// Kind of config this executor accepts.
    fn kind(&self) -> ExecutionKind;

    /// Runs `config` against `ctx`.
    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult;
}

/// Converts a millisecond timeout into a whole-second duration.
///
/// Zero or negative values select [`DEFAULT_TIMEOUT_SECS`]; positive values
/// round up to at least one second.
#[must_use]
pub fn timeout_from_ms(timeout_ms: i64) -> Duration {
    if timeout_ms <= 0 {
        return Duration::from_secs(DEFAULT_TIMEOUT_SECS);
    }
    Duration::from_secs(timeout_ms.unsigned_abs().div_ceil(1000).max(1))
}

/// Delay before the attempt following `attempt` (1-based).
///
/// Doubles from `base_ms`: `base_ms * 2^(attempt - 1)`, saturating.
#[must_use]
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

pub(crate) fn mismatch(expected: ExecutionKind, config: &ExecutionConfig) -> ExecutionResult {
    ExecutorError::ConfigMismatch {
        expected,
        found: config.kind(),
    }
    .into()
}
