//! Core shared types for the MCI tool-execution adapter.

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod error;
mod execution;
mod ids;
mod result;
mod tool;

/// Per-call template context and namespace views.
pub use context::{Context, Namespace, PathValidator, PropertyMap, string_map};
/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Execution configuration variants keyed by their `type` tag.
pub use execution::{
    ApiKeyLocation, AuthConfig, CliConfig, CliFlags, ExecutionConfig, ExecutionKind, FileConfig,
    FlagConfig, FlagKind, HttpBody, HttpConfig, HttpServer, McpConfig, McpServer, RetryConfig,
    StdioServer, TextConfig, DEFAULT_TIMEOUT_MS,
};
/// Identifier attached to every tool execution for log correlation.
pub use ids::ExecutionId;
/// Normalised result envelope returned by every executor.
pub use result::{ContentItem, ExecutionResult};
/// Tool definitions and their builder.
pub use tool::{Annotations, ToolDefinition, ToolDefinitionBuilder};
