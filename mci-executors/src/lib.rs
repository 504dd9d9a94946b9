//! Executors that turn an [`ExecutionConfig`](mci_primitives::ExecutionConfig)
//! and a [`Context`](mci_primitives::Context) into an
//! [`ExecutionResult`](mci_primitives::ExecutionResult).
//!
//! Each module implements the shared [`Executor`](traits::Executor) trait for
//! one execution kind. Executors template every config field before acting
//! and never return an error to the caller: failures become error results.

#![warn(missing_docs, clippy::pedantic)]

pub mod cli;
pub mod file;
pub mod http;
pub mod mcp;
pub mod text;
pub mod traits;

mod http_client;

pub use cli::{CliExecutor, CommandSpec, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use file::FileExecutor;
pub use http::HttpExecutor;
pub use mcp::{McpConnector, McpExecutor, McpSession, McpToolOutput, RmcpConnector};
pub use text::TextExecutor;
pub use traits::{Executor, ExecutorError, ExecutorResult, backoff_delay, timeout_from_ms};
