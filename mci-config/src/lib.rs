//! Configuration loading for MCI.
//!
//! [`SchemaDocument`] is the deserialised form of an MCI schema file: tool
//! definitions, MCP server descriptors and path-access settings.
//! [`RuntimeSettings`] carries process-level knobs read from the
//! environment.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod schema;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use schema::{SUPPORTED_SCHEMA_VERSIONS, SchemaDocument, SchemaMetadata};
pub use settings::{DEFAULT_MCP_TIMEOUT_MS, MCP_TIMEOUT_ENV, RuntimeSettings};
