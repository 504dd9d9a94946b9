//! Runtime registry for tool definitions and their execution.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use mci_config::{RuntimeSettings, SchemaDocument};
use mci_executors::{CliExecutor, Executor, FileExecutor, HttpExecutor, McpExecutor, TextExecutor};
use mci_policy::{DirectoryPolicy, PathSettings};
use mci_primitives::{
    Context, ExecutionId, ExecutionKind, ExecutionResult, McpServer, PropertyMap, ToolDefinition,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{ManagerError, ManagerResult};

/// Registry of tools plus the executor table used to run them.
///
/// Disabled tools are kept for completeness but are invisible to lookups,
/// listings and execution.
pub struct ToolManager {
    tools: RwLock<Vec<ToolDefinition>>,
    executors: HashMap<ExecutionKind, Arc<dyn Executor>>,
    path_settings: PathSettings,
    context_dir: Option<PathBuf>,
}

impl fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools = self.tools.read().expect("tool registry poisoned");
        let names: Vec<_> = tools.iter().map(ToolDefinition::name).collect();
        let mut kinds: Vec<_> = self.executors.keys().map(|kind| kind.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ToolManager")
            .field("registered", &names)
            .field("executors", &kinds)
            .field("context_dir", &self.context_dir)
            .finish_non_exhaustive()
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManager {
    /// Creates an empty manager with the built-in executors and no MCP
    /// servers.
    #[must_use]
    pub fn new() -> Self {
        let executors: [Arc<dyn Executor>; 5] = [
            Arc::new(HttpExecutor::new()),
            Arc::new(CliExecutor::new()),
            Arc::new(FileExecutor::new()),
            Arc::new(TextExecutor::new()),
            Arc::new(McpExecutor::default()),
        ];
        Self {
            tools: RwLock::new(Vec::new()),
            executors: executors
                .into_iter()
                .map(|executor| (executor.kind(), executor))
                .collect(),
            path_settings: PathSettings::default(),
            context_dir: None,
        }
    }

    /// Builds a manager from a loaded schema document.
    ///
    /// The document's MCP servers back the MCP executor, its path settings
    /// become the schema-level defaults and its context directory enables
    /// path validation for file tools.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::DuplicateTool`] or
    /// [`ManagerError::InvalidTool`] when a definition cannot be registered.
    pub fn from_schema(document: SchemaDocument, settings: &RuntimeSettings) -> ManagerResult<Self> {
        let (tools, servers, path_settings, context_dir) = document.into_parts();
        let servers: HashMap<String, McpServer> = servers.into_iter().collect();
        let mut manager = Self::new()
            .with_executor(Arc::new(
                McpExecutor::new(servers).with_timeout(settings.mcp_timeout()),
            ))
            .with_path_settings(path_settings);
        manager.context_dir = context_dir;

        for tool in tools {
            manager.register(tool)?;
        }
        info!(
            tools = manager.tool_count(),
            context_dir = ?manager.context_dir,
            "tool manager ready"
        );
        Ok(manager)
    }

    /// Replaces the executor registered for the executor's kind.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(executor.kind(), executor);
        self
    }

    /// Sets the schema-level path settings merged into every file tool.
    #[must_use]
    pub fn with_path_settings(mut self, settings: PathSettings) -> Self {
        self.path_settings = settings;
        self
    }

    /// Sets the directory path validation is anchored to.
    ///
    /// Without a context directory no path validator is attached.
    #[must_use]
    pub fn with_context_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context_dir = Some(dir.into());
        self
    }

    /// Directory path validation is anchored to, if any.
    #[must_use]
    pub fn context_dir(&self) -> Option<&Path> {
        self.context_dir.as_deref()
    }

    /// Registers a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidTool`] when the definition fails
    /// validation and [`ManagerError::DuplicateTool`] when the name is taken
    /// (disabled tools included).
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(&self, tool: ToolDefinition) -> ManagerResult<()> {
        tool.validate()?;
        let mut tools = self.tools.write().expect("tool registry poisoned");
        if tools.iter().any(|existing| existing.name() == tool.name()) {
            return Err(ManagerError::DuplicateTool {
                name: tool.name().to_owned(),
            });
        }
        debug!(tool = tool.name(), kind = %tool.execution().kind(), "registered tool");
        tools.push(tool);
        Ok(())
    }

    /// Returns the enabled tool with the given name (case-sensitive).
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<ToolDefinition> {
        let tools = self.tools.read().expect("tool registry poisoned");
        tools
            .iter()
            .find(|tool| !tool.is_disabled() && tool.name() == name)
            .cloned()
    }

    /// Lists every enabled tool in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.select(|_| true)
    }

    /// Filters enabled tools by name.
    ///
    /// `only` restricts the result to the listed names; `without` then
    /// removes the listed names.
    #[must_use]
    pub fn filter_tools(
        &self,
        only: Option<&[&str]>,
        without: Option<&[&str]>,
    ) -> Vec<ToolDefinition> {
        self.select(|tool| {
            only.is_none_or(|names| names.contains(&tool.name()))
                && !without.is_some_and(|names| names.contains(&tool.name()))
        })
    }

    /// Enabled tools carrying at least one of `tags`.
    ///
    /// An empty tag list selects nothing.
    #[must_use]
    pub fn tags(&self, tags: &[&str]) -> Vec<ToolDefinition> {
        self.select(|tool| tags.iter().any(|tag| tool.has_tag(tag)))
    }

    /// Enabled tools carrying none of `tags`.
    ///
    /// An empty tag list selects every enabled tool.
    #[must_use]
    pub fn without_tags(&self, tags: &[&str]) -> Vec<ToolDefinition> {
        self.select(|tool| !tags.iter().any(|tag| tool.has_tag(tag)))
    }

    /// Executes an enabled tool.
    ///
    /// Runtime failures of the tool itself are reported through the returned
    /// [`ExecutionResult`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::ToolNotFound`] for unknown or disabled tools,
    /// [`ManagerError::MissingProperties`] when required input is absent,
    /// [`ManagerError::Policy`] when the path policy cannot be built and
    /// [`ManagerError::NoExecutor`] when no executor handles the tool.
    pub async fn execute(
        &self,
        name: &str,
        props: PropertyMap,
        env: PropertyMap,
    ) -> ManagerResult<ExecutionResult> {
        let tool = self.get_tool(name).ok_or_else(|| ManagerError::ToolNotFound {
            name: name.to_owned(),
        })?;
        check_required(&tool, &props)?;

        let kind = tool.execution().kind();
        let executor = self
            .executors
            .get(&kind)
            .cloned()
            .ok_or_else(|| ManagerError::NoExecutor {
                kind: kind.to_string(),
            })?;
        let ctx = self.context_for(&tool, props, env)?;

        let execution_id = ExecutionId::random();
        let span = info_span!("tool_execution", %execution_id, tool = name, %kind);
        async move {
            debug!("dispatching tool");
            let result = executor.execute(tool.execution(), &ctx).await;
            if result.is_error() {
                warn!("tool execution returned an error result");
            } else {
                info!(items = result.content().len(), "tool execution succeeded");
            }
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Blocking variant of [`ToolManager::execute`].
    ///
    /// Drives the execution on a dedicated current-thread runtime. When
    /// called from inside a Tokio runtime the work moves to a scoped worker
    /// thread so the caller's runtime is never blocked re-entrantly.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`ToolManager::execute`] and
    /// [`ManagerError::Runtime`] when the runtime cannot be created.
    pub fn execute_blocking(
        &self,
        name: &str,
        props: PropertyMap,
        env: PropertyMap,
    ) -> ManagerResult<ExecutionResult> {
        let run = move || -> ManagerResult<ExecutionResult> {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| ManagerError::Runtime {
                    reason: err.to_string(),
                })?
                .block_on(self.execute(name, props, env))
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return run();
        }
        std::thread::scope(|scope| scope.spawn(run).join()).map_err(|_| ManagerError::Runtime {
            reason: "execution thread panicked".into(),
        })?
    }

    fn select(&self, keep: impl Fn(&ToolDefinition) -> bool) -> Vec<ToolDefinition> {
        let tools = self.tools.read().expect("tool registry poisoned");
        tools
            .iter()
            .filter(|tool| !tool.is_disabled() && keep(tool))
            .cloned()
            .collect()
    }

    fn tool_count(&self) -> usize {
        self.tools.read().expect("tool registry poisoned").len()
    }

    fn context_for(
        &self,
        tool: &ToolDefinition,
        props: PropertyMap,
        env: PropertyMap,
    ) -> ManagerResult<Context> {
        let ctx = Context::new(props, env);
        let Some(dir) = &self.context_dir else {
            return Ok(ctx);
        };
        let settings = PathSettings::merge(
            &self.path_settings,
            &PathSettings::new(tool.enable_any_paths(), tool.directory_allow_list().to_vec()),
        );
        let policy = DirectoryPolicy::new(dir, &settings)?;
        Ok(ctx.with_path_validator(Arc::new(policy)))
    }
}

fn check_required(tool: &ToolDefinition, props: &PropertyMap) -> ManagerResult<()> {
    let required = tool.required_properties();
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !props.contains_key(**name))
        .map(|name| (*name).to_owned())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ManagerError::MissingProperties {
        tool: tool.name().to_owned(),
        required: required.into_iter().map(str::to_owned).collect(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mci_primitives::{ExecutionConfig, FileConfig, TextConfig, string_map};
    use serde_json::{Value, json};

    fn text_tool(name: &str, text: &str) -> mci_primitives::ToolDefinitionBuilder {
        ToolDefinition::builder(
            name,
            ExecutionConfig::Text(TextConfig { text: text.into() }),
        )
    }

    fn props(value: Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    fn populated() -> ToolManager {
        let manager = ToolManager::new();
        for (name, tags, disabled) in [
            ("weather", &["api", "read"][..], false),
            ("deploy", &["ops"][..], false),
            ("notes", &[][..], false),
            ("legacy", &["api"][..], true),
        ] {
            let mut builder = text_tool(name, name).disabled(disabled);
            for tag in tags {
                builder = builder.add_tag(*tag).unwrap();
            }
            manager.register(builder.build().unwrap()).unwrap();
        }
        manager
    }

    fn names(tools: &[ToolDefinition]) -> Vec<&str> {
        tools.iter().map(ToolDefinition::name).collect()
    }

    #[test]
    fn lookups_skip_disabled_tools() {
        let manager = populated();
        assert_eq!(names(&manager.list_tools()), ["weather", "deploy", "notes"]);
        assert!(manager.get_tool("weather").is_some());
        assert!(manager.get_tool("Weather").is_none());
        assert!(manager.get_tool("legacy").is_none());
    }

    #[test]
    fn duplicate_registration_errors() {
        let manager = populated();
        let err = manager
            .register(text_tool("legacy", "again").build().unwrap())
            .unwrap_err();
        assert!(matches!(err, ManagerError::DuplicateTool { name } if name == "legacy"));
    }

    #[test]
    fn filters_by_name() {
        let manager = populated();
        assert_eq!(
            names(&manager.filter_tools(Some(&["weather", "deploy", "legacy"]), Some(&["deploy"]))),
            ["weather"]
        );
        assert_eq!(names(&manager.filter_tools(None, Some(&["notes"]))), ["weather", "deploy"]);
        assert_eq!(manager.filter_tools(None, None).len(), 3);
    }

    #[test]
    fn filters_by_tag() {
        let manager = populated();
        assert_eq!(names(&manager.tags(&["api", "ops"])), ["weather", "deploy"]);
        assert!(manager.tags(&[]).is_empty());
        assert_eq!(names(&manager.without_tags(&["api"])), ["deploy", "notes"]);
        assert_eq!(manager.without_tags(&[]).len(), 3);
    }

    #[tokio::test]
    async fn executes_text_tool() {
        let manager = ToolManager::new();
        manager
            .register(text_tool("greet", "Hello {{props.name}} from {{env.HOST}}!").build().unwrap())
            .unwrap();

        let result = manager
            .execute("greet", props(json!({ "name": "Alice" })), string_map([("HOST", "ci")]))
            .await
            .unwrap();

        assert_eq!(result.text_content(), "Hello Alice from ci!");
    }

    #[tokio::test]
    async fn unknown_and_disabled_tools_are_not_found() {
        let manager = populated();
        for name in ["missing", "legacy"] {
            let err = manager
                .execute(name, PropertyMap::new(), PropertyMap::new())
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), format!("Tool not found: {name}"));
        }
    }

    #[tokio::test]
    async fn required_properties_are_enforced() {
        let manager = ToolManager::new();
        manager
            .register(
                text_tool("search", "{{props.query}}")
                    .input_schema(json!({
                        "type": "object",
                        "properties": { "query": {}, "limit": {} },
                        "required": ["query", "limit"]
                    }))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let err = manager
            .execute("search", props(json!({ "limit": 3 })), PropertyMap::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Tool 'search' requires properties: query, limit. Missing: query"
        );

        let ok = manager
            .execute("search", props(json!({ "query": "rust", "limit": 3 })), PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(ok.text_content(), "rust");
    }

    #[tokio::test]
    async fn template_failures_are_results_not_errors() {
        let manager = ToolManager::new();
        manager
            .register(text_tool("leak", "{{props.TOKEN}}").build().unwrap())
            .unwrap();

        let result = manager
            .execute("leak", PropertyMap::new(), string_map([("TOKEN", "secret")]))
            .await
            .unwrap();

        assert!(result.is_error());
        assert!(!result.error().unwrap().contains("secret"));
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(PropertyMap, PropertyMap, bool)>>,
    }

    #[async_trait]
    impl Executor for Recording {
        fn kind(&self) -> ExecutionKind {
            ExecutionKind::Text
        }

        async fn execute(&self, _config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
            self.seen.lock().unwrap().push((
                ctx.props().clone(),
                ctx.env().clone(),
                ctx.path_validator().is_some(),
            ));
            ExecutionResult::text("recorded")
        }
    }

    #[tokio::test]
    async fn dispatches_by_kind_to_replacement_executor() {
        let recording = Arc::new(Recording::default());
        let manager = ToolManager::new()
            .with_executor(Arc::clone(&recording) as Arc<dyn Executor>)
            .with_context_dir(".");
        manager.register(text_tool("t", "x").build().unwrap()).unwrap();

        let result = manager
            .execute("t", props(json!({ "k": "p" })), string_map([("k", "e")]))
            .await
            .unwrap();

        assert_eq!(result.text_content(), "recorded");
        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen[0].0["k"], "p");
        assert_eq!(seen[0].1["k"], "e");
        assert!(seen[0].2);
    }

    fn file_tool(name: &str, allow: Vec<String>) -> ToolDefinition {
        ToolDefinition::builder(
            name,
            ExecutionConfig::File(FileConfig {
                path: "{{props.path}}".into(),
                enable_templating: false,
            }),
        )
        .path_access(false, allow)
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn file_tools_are_confined_to_the_context_dir() {
        let root = tempfile::tempdir().unwrap();
        let context = root.path().join("project");
        let outside = root.path().join("outside");
        fs::create_dir_all(&context).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(context.join("inside.txt"), "in").unwrap();
        fs::write(outside.join("secret.txt"), "out").unwrap();

        let manager = ToolManager::new().with_context_dir(&context);
        manager.register(file_tool("read", Vec::new())).unwrap();
        manager
            .register(file_tool("read_outside", vec!["../outside".into()]))
            .unwrap();

        let inside = manager
            .execute(
                "read",
                props(json!({ "path": context.join("inside.txt") })),
                PropertyMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(inside.text_content(), "in");

        let secret = outside.join("secret.txt");
        let denied = manager
            .execute("read", props(json!({ "path": secret })), PropertyMap::new())
            .await
            .unwrap();
        assert!(denied.is_error());
        assert!(denied.error().unwrap().contains("path access denied"));

        let allowed = manager
            .execute("read_outside", props(json!({ "path": secret })), PropertyMap::new())
            .await
            .unwrap();
        assert_eq!(allowed.text_content(), "out");
    }

    #[tokio::test]
    async fn builds_from_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "Hi {{props.who}}").unwrap();
        let schema = dir.path().join("tools.mci.json");
        fs::write(
            &schema,
            json!({
                "schemaVersion": "1.0",
                "tools": [{
                    "name": "hello",
                    "execution": { "type": "file", "path": "{{env.DIR}}/hello.txt" }
                }]
            })
            .to_string(),
        )
        .unwrap();

        let document = SchemaDocument::from_path(&schema).unwrap();
        let manager = ToolManager::from_schema(document, &RuntimeSettings::default()).unwrap();
        assert_eq!(manager.context_dir(), Some(dir.path()));

        let result = manager
            .execute(
                "hello",
                props(json!({ "who": "Bob" })),
                string_map([("DIR", dir.path().to_str().unwrap())]),
            )
            .await
            .unwrap();
        assert_eq!(result.text_content(), "Hi Bob");
    }

    #[test]
    fn blocking_execute_outside_runtime() {
        let manager = ToolManager::new();
        manager.register(text_tool("t", "{{props.v}}").build().unwrap()).unwrap();

        let result = manager
            .execute_blocking("t", props(json!({ "v": 42 })), PropertyMap::new())
            .unwrap();

        assert_eq!(result.text_content(), "42");
    }

    #[tokio::test]
    async fn blocking_execute_inside_runtime() {
        let manager = ToolManager::new();
        manager.register(text_tool("t", "{{props.v}}").build().unwrap()).unwrap();

        let result = manager
            .execute_blocking("t", props(json!({ "v": "nested" })), PropertyMap::new())
            .unwrap();

        assert_eq!(result.text_content(), "nested");
        assert!(matches!(
            manager.execute_blocking("nope", PropertyMap::new(), PropertyMap::new()),
            Err(ManagerError::ToolNotFound { .. })
        ));
    }
}
