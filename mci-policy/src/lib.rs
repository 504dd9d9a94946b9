//! Path access policy for tool execution.
//!
//! A [`DirectoryPolicy`] restricts file access to the schema's context
//! directory plus an allow-list, unless `enableAnyPaths` lifts the check.
//! Schema-level and tool-level [`PathSettings`] are merged before a policy is
//! built.

#![warn(missing_docs, clippy::pedantic)]

mod directory;
mod error;
mod settings;

pub use directory::DirectoryPolicy;
pub use error::{PolicyError, PolicyResult};
pub use settings::PathSettings;
