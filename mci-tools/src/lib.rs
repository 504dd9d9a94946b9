//! Tool registry and dispatch.
//!
//! [`ToolManager`] owns the registered [`ToolDefinition`]s, validates call
//! input against each tool's declared required properties, builds the
//! per-call [`Context`] and hands the tool's execution config to the
//! executor registered for its kind.
//!
//! [`ToolDefinition`]: mci_primitives::ToolDefinition
//! [`Context`]: mci_primitives::Context

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod manager;

pub use error::{ManagerError, ManagerResult};
pub use manager::ToolManager;
