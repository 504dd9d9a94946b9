//! Schema document model.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use mci_policy::PathSettings;
use mci_primitives::{McpServer, ToolDefinition};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// `schemaVersion` values accepted by the loader.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0"];

/// Descriptive metadata of a schema file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Document version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// License identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Authors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

/// A parsed and validated MCI schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<SchemaMetadata>,
    #[serde(default)]
    tools: Vec<ToolDefinition>,
    #[serde(default, rename = "mcp_servers", skip_serializing_if = "BTreeMap::is_empty")]
    mcp_servers: BTreeMap<String, McpServer>,
    #[serde(flatten)]
    paths: PathSettings,
    #[serde(skip)]
    context_dir: Option<PathBuf>,
}

impl SchemaDocument {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and the
    /// validation errors of [`SchemaDocument::validate`].
    pub fn from_json_str(source: &str) -> ConfigResult<Self> {
        let document: Self = serde_json::from_str(source).map_err(ConfigError::parse)?;
        document.validate()?;
        Ok(document)
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and the
    /// validation errors of [`SchemaDocument::validate`].
    pub fn from_yaml_str(source: &str) -> ConfigResult<Self> {
        let document: Self = serde_yaml::from_str(source).map_err(ConfigError::parse)?;
        document.validate()?;
        Ok(document)
    }

    /// Loads a schema file, choosing the format by extension.
    ///
    /// The file's parent directory becomes the document's context directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read,
    /// [`ConfigError::UnsupportedExtension`] for unknown extensions and the
    /// parse/validation errors of the string loaders.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let source = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let mut document = match extension.as_str() {
            "json" => Self::from_json_str(&source)?,
            "yaml" | "yml" => Self::from_yaml_str(&source)?,
            _ => return Err(ConfigError::UnsupportedExtension { extension }),
        };
        document.context_dir = Some(
            path.parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        );
        debug!(
            path = %path.display(),
            tools = document.tools.len(),
            servers = document.mcp_servers.len(),
            "loaded schema document"
        );
        Ok(document)
    }

    /// Checks the version and every tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedVersion`],
    /// [`ConfigError::InvalidTool`] or [`ConfigError::DuplicateTool`].
    pub fn validate(&self) -> ConfigResult<()> {
        if !SUPPORTED_SCHEMA_VERSIONS.contains(&self.schema_version.as_str()) {
            return Err(ConfigError::UnsupportedVersion {
                version: self.schema_version.clone(),
            });
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            tool.validate()?;
            if !seen.insert(tool.name()) {
                return Err(ConfigError::DuplicateTool {
                    name: tool.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Declared schema version.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Optional descriptive metadata.
    #[must_use]
    pub fn metadata(&self) -> Option<&SchemaMetadata> {
        self.metadata.as_ref()
    }

    /// Tool definitions in document order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// MCP server descriptors keyed by name.
    #[must_use]
    pub fn mcp_servers(&self) -> &BTreeMap<String, McpServer> {
        &self.mcp_servers
    }

    /// Schema-level path settings.
    #[must_use]
    pub fn path_settings(&self) -> &PathSettings {
        &self.paths
    }

    /// Directory containing the schema file, when loaded from disk.
    #[must_use]
    pub fn context_dir(&self) -> Option<&Path> {
        self.context_dir.as_deref()
    }

    /// Overrides the context directory.
    #[must_use]
    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    /// Splits the document into its owned parts.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        Vec<ToolDefinition>,
        BTreeMap<String, McpServer>,
        PathSettings,
        Option<PathBuf>,
    ) {
        (self.tools, self.mcp_servers, self.paths, self.context_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mci_primitives::{ExecutionConfig, ExecutionKind};
    use std::fs;

    const JSON: &str = r#"{
        "schemaVersion": "1.0",
        "metadata": { "name": "demo", "authors": ["ops"] },
        "enableAnyPaths": false,
        "directoryAllowList": ["shared"],
        "tools": [
            {
                "name": "greet",
                "description": "Say hello",
                "tags": ["social"],
                "inputSchema": { "type": "object", "required": ["name"] },
                "execution": { "type": "text", "text": "Hello {{props.name}}!" }
            },
            {
                "name": "list_repos",
                "execution": { "type": "mcp", "serverName": "github", "toolName": "list_repos" }
            }
        ],
        "mcp_servers": {
            "github": {
                "command": "npx",
                "args": ["-y", "@modelcontextprotocol/server-github"],
                "env": { "GITHUB_TOKEN": "{{env.GITHUB_TOKEN}}" }
            },
            "remote": { "url": "https://mcp.example.com/mcp" }
        }
    }"#;

    #[test]
    fn parses_json_document() {
        let document = SchemaDocument::from_json_str(JSON).unwrap();
        assert_eq!(document.schema_version(), "1.0");
        assert_eq!(document.metadata().unwrap().name.as_deref(), Some("demo"));
        assert_eq!(document.tools().len(), 2);
        assert_eq!(document.tools()[0].required_properties(), ["name"]);
        assert_eq!(
            document.tools()[1].execution().kind(),
            ExecutionKind::Mcp
        );
        assert_eq!(document.path_settings().directory_allow_list(), ["shared"]);
        assert!(matches!(
            document.mcp_servers()["github"],
            McpServer::Stdio(_)
        ));
        assert!(matches!(document.mcp_servers()["remote"], McpServer::Http(_)));
        assert!(document.context_dir().is_none());
    }

    #[test]
    fn parses_yaml_document() {
        let yaml = r"
schemaVersion: '1.0'
tools:
  - name: read_notes
    execution:
      type: file
      path: ./notes/{{props.name}}.md
      enableTemplating: false
  - name: run_ls
    execution:
      type: cli
      command: ls
      args: ['-l']
      flags:
        --all: { from: props.all, type: boolean }
        -h: { from: props.human, type: boolean }
        --block-size: { from: props.size, type: value }
";
        let document = SchemaDocument::from_yaml_str(yaml).unwrap();
        let ExecutionConfig::File(file) = document.tools()[0].execution() else {
            panic!("expected file config");
        };
        assert!(!file.enable_templating);
        let ExecutionConfig::Cli(cli) = document.tools()[1].execution() else {
            panic!("expected cli config");
        };
        let tokens: Vec<_> = cli.flags.iter().map(|(token, _)| token).collect();
        assert_eq!(tokens, ["--all", "-h", "--block-size"]);
        assert_eq!(cli.timeout_ms, 30_000);
    }

    #[test]
    fn rejects_unknown_version_and_duplicates() {
        let err = SchemaDocument::from_json_str(r#"{ "schemaVersion": "9.9" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));

        let err = SchemaDocument::from_json_str(
            r#"{ "schemaVersion": "1.0", "tools": [
                { "name": "a", "execution": { "type": "text", "text": "x" } },
                { "name": "a", "execution": { "type": "text", "text": "y" } }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTool { name } if name == "a"));
    }

    #[test]
    fn rejects_malformed_documents() {
        let err = SchemaDocument::from_json_str(r#"{ "tools": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = SchemaDocument::from_json_str(
            r#"{ "schemaVersion": "1.0", "tools": [
                { "name": "x", "execution": { "type": "ftp", "url": "x" } }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = SchemaDocument::from_json_str(
            r#"{ "schemaVersion": "1.0", "tools": [
                { "name": " ", "execution": { "type": "text", "text": "x" } }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTool(_)));
    }

    #[test]
    fn from_path_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("tools.mci.json");
        fs::write(&json_path, JSON).unwrap();

        let document = SchemaDocument::from_path(&json_path).unwrap();
        assert_eq!(document.context_dir(), Some(dir.path()));

        let toml_path = dir.path().join("tools.toml");
        fs::write(&toml_path, "").unwrap();
        assert!(matches!(
            SchemaDocument::from_path(&toml_path),
            Err(ConfigError::UnsupportedExtension { extension }) if extension == "toml"
        ));

        assert!(matches!(
            SchemaDocument::from_path(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
