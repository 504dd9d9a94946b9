//! Declarative tool execution.
//!
//! Depend on this crate via `cargo add mci`. It bundles the workspace crates
//! behind feature flags: the template engine and primitives are always
//! available, everything else can be switched off.

#![warn(missing_docs, clippy::pedantic)]

/// Context, execution configs, tool definitions and result envelope.
pub use mci_primitives as primitives;

/// Placeholder and directive rendering.
pub use mci_templates as templates;

/// Directory allow-list path policy (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use mci_policy as policy;

/// HTTP, CLI, file, text and MCP executors (enabled by `executors` feature).
#[cfg(feature = "executors")]
pub use mci_executors as executors;

/// Tool registry and dispatch (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use mci_tools as tools;

/// Schema loading and runtime settings (enabled by `config` feature).
#[cfg(feature = "config")]
pub use mci_config as config;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use mci_telemetry as telemetry;

pub use mci_primitives::{Context, ExecutionResult, ToolDefinition};
pub use mci_templates::TemplateEngine;

#[cfg(feature = "tools")]
pub use mci_tools::{ManagerError, ToolManager};
