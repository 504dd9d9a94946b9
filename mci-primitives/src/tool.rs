//! Tool definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::execution::ExecutionConfig;

const MAX_NAME_LEN: usize = 128;

/// Behavioural hints advertised alongside a tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tool does not modify its environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Tool may perform destructive updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Repeated calls with the same input have no additional effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// Tool interacts with external entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// Declarative description of a single tool.
///
/// Constructed at load time and never mutated by execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    name: String,
    #[serde(default)]
    disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotations: Option<Annotations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_schema: Option<Value>,
    execution: ExecutionConfig,
    #[serde(default)]
    enable_any_paths: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    directory_allow_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

impl ToolDefinition {
    /// Starts building a tool definition.
    #[must_use]
    pub fn builder(name: impl Into<String>, execution: ExecutionConfig) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            definition: Self {
                name: name.into(),
                disabled: false,
                description: None,
                annotations: None,
                input_schema: None,
                execution,
                enable_any_paths: false,
                directory_allow_list: Vec::new(),
                tags: Vec::new(),
            },
        }
    }

    /// Validates a definition obtained through deserialisation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolName`] for an unusable name and
    /// [`Error::InvalidDefinition`] for a non-object input schema.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if let Some(schema) = &self.input_schema {
            if !schema.is_object() {
                return Err(Error::InvalidDefinition {
                    reason: format!("input schema of `{}` must be an object", self.name),
                });
            }
        }
        Ok(())
    }

    /// Tool name, unique within its registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when the tool is disabled.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Optional annotations.
    #[must_use]
    pub fn annotations(&self) -> Option<&Annotations> {
        self.annotations.as_ref()
    }

    /// Optional JSON input schema.
    #[must_use]
    pub fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    /// Execution configuration.
    #[must_use]
    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    /// Tool-level override allowing any file path.
    #[must_use]
    pub const fn enable_any_paths(&self) -> bool {
        self.enable_any_paths
    }

    /// Tool-level directory allow-list.
    #[must_use]
    pub fn directory_allow_list(&self) -> &[String] {
        &self.directory_allow_list
    }

    /// Tags attached to the tool.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns true when the tool carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Names listed under `required` in the input schema.
    #[must_use]
    pub fn required_properties(&self) -> Vec<&str> {
        self.input_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array)
            .map(|required| required.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Builder for [`ToolDefinition`].
#[derive(Debug)]
pub struct ToolDefinitionBuilder {
    definition: ToolDefinition,
}

impl ToolDefinitionBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = Some(description.into());
        self
    }

    /// Sets the annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: Annotations) -> Self {
        self.definition.annotations = Some(annotations);
        self
    }

    /// Sets the JSON input schema.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.definition.input_schema = Some(schema);
        self
    }

    /// Marks the tool as disabled.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.definition.disabled = disabled;
        self
    }

    /// Adds a tag label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] when the tag is empty.
    pub fn add_tag(mut self, tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(Error::InvalidDefinition {
                reason: "tool tag cannot be empty".into(),
            });
        }
        self.definition.tags.push(tag);
        Ok(self)
    }

    /// Overrides path access for this tool.
    #[must_use]
    pub fn path_access(mut self, enable_any_paths: bool, allow_list: Vec<String>) -> Self {
        self.definition.enable_any_paths = enable_any_paths;
        self.definition.directory_allow_list = allow_list;
        self
    }

    /// Finalises the definition.
    ///
    /// # Errors
    ///
    /// Propagates validation failures from [`ToolDefinition::validate`].
    pub fn build(self) -> Result<ToolDefinition> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidToolName {
            name: name.into(),
            reason: "name cannot be empty".into(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidToolName {
            name: name.into(),
            reason: format!("name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if name.chars().any(char::is_control) {
        return Err(Error::InvalidToolName {
            name: name.escape_debug().to_string(),
            reason: "name cannot contain control characters".into(),
        });
    }

    Ok(())
}
