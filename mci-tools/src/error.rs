use mci_policy::PolicyError;
use thiserror::Error;

/// Result alias for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Misuse reported by [`ToolManager`](crate::ToolManager).
///
/// Runtime failures of a tool are not errors here; they come back as error
/// [`ExecutionResult`](mci_primitives::ExecutionResult)s.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No enabled tool carries the name.
    #[error("Tool not found: {name}")]
    ToolNotFound {
        /// Requested name.
        name: String,
    },

    /// Required input properties were not supplied.
    #[error(
        "Tool '{tool}' requires properties: {}. Missing: {}",
        required.join(", "),
        missing.join(", ")
    )]
    MissingProperties {
        /// Tool name.
        tool: String,
        /// Every required property.
        required: Vec<String>,
        /// Required properties absent from the call.
        missing: Vec<String>,
    },

    /// A tool with the same name is already registered.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// The definition failed validation.
    #[error(transparent)]
    InvalidTool(#[from] mci_primitives::Error),

    /// The path policy could not be built.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// No executor handles the tool's execution kind.
    #[error("no executor registered for `{kind}` tools")]
    NoExecutor {
        /// Execution kind tag.
        kind: String,
    },

    /// The blocking entry point could not drive the execution.
    #[error("failed to run tool execution: {reason}")]
    Runtime {
        /// Underlying error.
        reason: String,
    },
}
