//! File executor.

use std::io::ErrorKind;

use async_trait::async_trait;
use mci_primitives::{Context, ExecutionConfig, ExecutionKind, ExecutionResult, FileConfig};
use mci_templates::TemplateEngine;
use tracing::debug;

use crate::traits::{Executor, ExecutorError, ExecutorResult, mismatch};

/// Reads a file and optionally renders its contents as a template.
///
/// The rendered path is used literally: no tilde expansion and no traversal
/// normalisation. Access control is delegated to the context's path
/// validator when one is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExecutor {
    engine: TemplateEngine,
}

impl FileExecutor {
    /// Creates a file executor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: TemplateEngine::new(),
        }
    }

    async fn run(&self, config: &FileConfig, ctx: &Context) -> ExecutorResult<ExecutionResult> {
        let path = self.engine.render_basic(&config.path, ctx)?;
        if let Some(validator) = ctx.path_validator() {
            validator.validate(&path)?;
        }

        let metadata = tokio::fs::metadata(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ExecutorError::FileNotFound { path: path.clone() },
            _ => ExecutorError::Io {
                path: path.clone(),
                reason: err.to_string(),
            },
        })?;
        if !metadata.is_file() {
            return Err(ExecutorError::NotAFile { path });
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| ExecutorError::Io {
                path: path.clone(),
                reason: err.to_string(),
            })?;
        debug!(
            bytes = content.len(),
            templated = config.enable_templating,
            "read file"
        );

        let content = if config.enable_templating {
            self.engine.render_advanced(&content, ctx)?
        } else {
            content
        };
        Ok(ExecutionResult::text(content))
    }
}

#[async_trait]
impl Executor for FileExecutor {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::File
    }

    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
        let ExecutionConfig::File(file) = config else {
            return mismatch(ExecutionKind::File, config);
        };
        self.run(file, ctx)
            .await
            .unwrap_or_else(ExecutionResult::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use mci_primitives::{PathValidator, string_map};
    use serde_json::json;

    struct DenyAll;

    impl PathValidator for DenyAll {
        fn validate(&self, path: &str) -> mci_primitives::Result<()> {
            Err(mci_primitives::Error::path_denied(path, "outside allow-list"))
        }
    }

    fn ctx(dir: &std::path::Path, props: serde_json::Value) -> Context {
        Context::new(
            props.as_object().cloned().unwrap(),
            string_map([("DIR", dir.to_str().unwrap()), ("SECRET", "hunter2")]),
        )
    }

    fn config(path: &str, enable_templating: bool) -> ExecutionConfig {
        ExecutionConfig::File(FileConfig {
            path: path.into(),
            enable_templating,
        })
    }

    #[tokio::test]
    async fn reads_and_renders_directives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("report.txt"),
            "Report for {{props.name}}\n@foreach(item in props.items)- {{item}}\n@endforeach",
        )
        .unwrap();

        let result = FileExecutor::new()
            .execute(
                &config("{{env.DIR}}/report.txt", true),
                &ctx(dir.path(), json!({ "name": "Alice", "items": ["a", "b"] })),
            )
            .await;

        assert!(!result.is_error(), "{:?}", result.error());
        assert_eq!(result.text_content(), "Report for Alice\n- a\n- b\n");
    }

    #[tokio::test]
    async fn templating_disabled_returns_raw_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("raw.txt"), "{{env.SECRET}}").unwrap();

        let result = FileExecutor::new()
            .execute(
                &config("{{env.DIR}}/{{props.name}}", false),
                &ctx(dir.path(), json!({ "name": "raw.txt" })),
            )
            .await;

        assert_eq!(result.text_content(), "{{env.SECRET}}");
    }

    #[tokio::test]
    async fn traversal_is_kept_literally() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("target.txt"), "found").unwrap();

        let ctx = ctx(dir.path(), json!({ "name": "nested/../target.txt" }));
        let rendered = TemplateEngine::new()
            .render_basic("{{env.DIR}}/{{props.name}}", &ctx)
            .unwrap();
        assert!(rendered.ends_with("/nested/../target.txt"));

        let result = FileExecutor::new()
            .execute(&config("{{env.DIR}}/{{props.name}}", false), &ctx)
            .await;
        assert_eq!(result.text_content(), "found");
    }

    #[tokio::test]
    async fn missing_file_and_directory_fail() {
        let dir = tempfile::tempdir().unwrap();
        let executor = FileExecutor::new();
        let ctx = ctx(dir.path(), json!({}));

        let missing = executor
            .execute(&config("{{env.DIR}}/nope.txt", false), &ctx)
            .await;
        assert!(missing.is_error());
        assert!(missing.error().unwrap().starts_with("File not found"));

        let directory = executor.execute(&config("{{env.DIR}}", false), &ctx).await;
        assert!(directory.error().unwrap().starts_with("Path is not a file"));
    }

    #[tokio::test]
    async fn validator_is_consulted_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("secret.txt"), "classified").unwrap();
        let ctx = ctx(dir.path(), json!({})).with_path_validator(Arc::new(DenyAll));

        let result = FileExecutor::new()
            .execute(&config("{{env.DIR}}/secret.txt", false), &ctx)
            .await;

        assert!(result.is_error());
        assert!(result.error().unwrap().contains("path access denied"));
    }

    #[tokio::test]
    async fn content_template_errors_become_results() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), "{{props.missing}}").unwrap();

        let result = FileExecutor::new()
            .execute(
                &config("{{env.DIR}}/bad.txt", true),
                &ctx(dir.path(), json!({})),
            )
            .await;

        assert!(result.error().unwrap().contains("props.missing"));
    }
}
