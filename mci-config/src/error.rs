use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading a schema document or runtime settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The schema file could not be read.
    #[error("failed to read schema file {}: {reason}", path.display())]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },

    /// The file extension is not one of `.json`, `.yaml`, `.yml`.
    #[error("unsupported schema file extension `{extension}` (expected .json, .yaml or .yml)")]
    UnsupportedExtension {
        /// Extension found, empty when missing.
        extension: String,
    },

    /// The document is not valid JSON/YAML or does not match the schema.
    #[error("invalid schema document: {reason}")]
    Parse {
        /// Deserializer message.
        reason: String,
    },

    /// `schemaVersion` names a version this crate does not understand.
    #[error("unsupported schema version `{version}`")]
    UnsupportedVersion {
        /// Version found in the document.
        version: String,
    },

    /// A tool definition failed validation.
    #[error(transparent)]
    InvalidTool(#[from] mci_primitives::Error),

    /// Two tools share a name.
    #[error("duplicate tool name `{name}`")]
    DuplicateTool {
        /// Repeated name.
        name: String,
    },

    /// An environment variable held an unusable value.
    #[error("invalid value for {variable}: {reason}")]
    InvalidEnv {
        /// Variable name.
        variable: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn parse(reason: impl ToString) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }
}
