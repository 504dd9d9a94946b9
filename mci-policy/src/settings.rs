//! Path access settings as they appear in schema files.

use serde::{Deserialize, Serialize};

/// `enableAnyPaths` / `directoryAllowList` pair.
///
/// Appears at schema level and per tool; [`PathSettings::merge`] combines the
/// two with tool precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSettings {
    #[serde(default)]
    enable_any_paths: bool,
    #[serde(default)]
    directory_allow_list: Vec<String>,
}

impl PathSettings {
    /// Creates settings from their parts.
    #[must_use]
    pub fn new(enable_any_paths: bool, directory_allow_list: Vec<String>) -> Self {
        Self {
            enable_any_paths,
            directory_allow_list,
        }
    }

    /// Settings that disable path checks altogether.
    #[must_use]
    pub fn allow_any() -> Self {
        Self::new(true, Vec::new())
    }

    /// Returns true when every path is permitted.
    #[must_use]
    pub const fn enable_any_paths(&self) -> bool {
        self.enable_any_paths
    }

    /// Extra directories permitted besides the context directory.
    #[must_use]
    pub fn directory_allow_list(&self) -> &[String] {
        &self.directory_allow_list
    }

    /// Merges schema-level and tool-level settings.
    ///
    /// `enableAnyPaths` is the logical or of both levels. The tool's
    /// allow-list replaces the schema's when it is non-empty.
    #[must_use]
    pub fn merge(schema: &Self, tool: &Self) -> Self {
        let directory_allow_list = if tool.directory_allow_list.is_empty() {
            schema.directory_allow_list.clone()
        } else {
            tool.directory_allow_list.clone()
        };
        Self {
            enable_any_paths: tool.enable_any_paths || schema.enable_any_paths,
            directory_allow_list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_list_takes_precedence() {
        let schema = PathSettings::new(false, vec!["shared".into()]);
        let tool = PathSettings::new(false, vec!["tool-only".into()]);
        let merged = PathSettings::merge(&schema, &tool);
        assert_eq!(merged.directory_allow_list(), ["tool-only"]);
        assert!(!merged.enable_any_paths());
    }

    #[test]
    fn empty_tool_list_falls_back_to_schema() {
        let schema = PathSettings::new(false, vec!["shared".into()]);
        let merged = PathSettings::merge(&schema, &PathSettings::default());
        assert_eq!(merged.directory_allow_list(), ["shared"]);
    }

    #[test]
    fn enable_any_is_or_of_levels() {
        let on = PathSettings::allow_any();
        let off = PathSettings::default();
        assert!(PathSettings::merge(&on, &off).enable_any_paths());
        assert!(PathSettings::merge(&off, &on).enable_any_paths());
        assert!(!PathSettings::merge(&off, &off).enable_any_paths());
    }

    #[test]
    fn deserializes_camel_case() {
        let settings: PathSettings = serde_json::from_str(
            r#"{ "enableAnyPaths": true, "directoryAllowList": ["/data"] }"#,
        )
        .unwrap();
        assert!(settings.enable_any_paths());
        assert_eq!(settings.directory_allow_list(), ["/data"]);

        let empty: PathSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, PathSettings::default());
    }
}
