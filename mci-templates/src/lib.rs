//! Template engine for tool configurations and content.
//!
//! Two entry points share one resolver:
//!
//! * [`TemplateEngine::render_basic`] substitutes `{{namespace.path}}`
//!   placeholders and nothing else. Executors use it for config fields.
//! * [`TemplateEngine::render_advanced`] additionally expands `@for`,
//!   `@foreach` and `@if` blocks. It is used for file and text content.
//!
//! Substitution is single pass: a resolved value is written to the output
//! verbatim and never scanned again, so property values that contain
//! template syntax cannot reach the environment namespace.
//!
//! ```
//! use mci_primitives::{Context, string_map};
//! use mci_templates::TemplateEngine;
//! use serde_json::json;
//!
//! let props = json!({ "name": "Alice" }).as_object().cloned().unwrap();
//! let ctx = Context::new(props, string_map([("GREETING", "Hello")]));
//!
//! let engine = TemplateEngine::new();
//! let rendered = engine.render_basic("{{env.GREETING}} {{props.name}}!", &ctx).unwrap();
//! assert_eq!(rendered, "Hello Alice!");
//! ```

#![warn(missing_docs, clippy::pedantic)]

mod condition;
mod engine;
mod error;
mod parser;
mod resolve;

pub use engine::{MAX_LOOP_ITERATIONS, TemplateEngine};
pub use error::{TemplateError, TemplateResult};
pub use resolve::{is_truthy, stringify};
