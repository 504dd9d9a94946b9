//! Template errors.
//!
//! Messages name the offending path but never include resolved values.

use thiserror::Error;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors raised while parsing or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The first path segment is not a namespace or loop variable.
    #[error(
        "Failed to resolve placeholder '{path}': '{root}' is not a recognised namespace (expected props, env, or input)"
    )]
    UnknownNamespace {
        /// Full placeholder path.
        path: String,
        /// Offending first segment.
        root: String,
    },

    /// A path segment was absent from its parent mapping.
    #[error("Failed to resolve placeholder '{path}': key '{key}' not found")]
    MissingKey {
        /// Full placeholder path.
        path: String,
        /// Missing segment.
        key: String,
    },

    /// A lookup was attempted on a value that is not a mapping.
    #[error("Failed to resolve placeholder '{path}': cannot access '{key}' on non-dict value")]
    NonDictAccess {
        /// Full placeholder path.
        path: String,
        /// Segment that could not be looked up.
        key: String,
    },

    /// The path names a namespace without selecting a key inside it.
    #[error("Failed to resolve placeholder '{path}': path must select a key inside the namespace")]
    IncompletePath {
        /// Full placeholder path.
        path: String,
    },

    /// A `@foreach` target is missing or not a collection.
    #[error("Cannot iterate over '{path}': expected array or object, found {found}")]
    NotIterable {
        /// Target path.
        path: String,
        /// Description of what was found instead.
        found: String,
    },

    /// A `@for` range exceeds the iteration limit.
    #[error("range({start}, {end}) exceeds the limit of {limit} iterations")]
    RangeTooLarge {
        /// Range start.
        start: i64,
        /// Range end.
        end: i64,
        /// Maximum permitted iterations.
        limit: i64,
    },

    /// Loops across the whole render exceed the iteration limit.
    #[error("template exceeds the limit of {limit} loop iterations")]
    TooManyIterations {
        /// Maximum permitted iterations per render.
        limit: i64,
    },

    /// The template is syntactically malformed.
    #[error("template syntax error: {reason}")]
    Syntax {
        /// Description of the problem.
        reason: String,
    },
}

impl TemplateError {
    /// Convenience constructor for syntax errors.
    #[must_use]
    pub fn syntax(reason: impl Into<String>) -> Self {
        Self::Syntax {
            reason: reason.into(),
        }
    }
}
