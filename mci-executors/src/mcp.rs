//! MCP executor.
//!
//! Tools of kind `mcp` proxy a call to a tool on a registered MCP server.
//! Each call opens its own session, performs exactly one operation and tears
//! the session down on every exit path.
//!
//! Server descriptors are templated against the environment only: connection
//! parameters are provisioning-time secrets and never see per-call props.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mci_primitives::{
    ContentItem, Context, ExecutionConfig, ExecutionKind, ExecutionResult, HttpServer, McpConfig,
    McpServer, StdioServer,
};
use mci_templates::TemplateEngine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::traits::{Executor, ExecutorError, ExecutorResult, mismatch};

/// Per round-trip limit applied when none is configured.
pub const DEFAULT_MCP_TIMEOUT: Duration = Duration::from_secs(60);

/// Normalised outcome of a remote tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpToolOutput {
    /// Content blocks the client understands; others are dropped.
    pub content: Vec<ContentItem>,
    /// Whether the remote tool flagged the call as failed.
    pub is_error: bool,
}

impl McpToolOutput {
    /// Extracts content and the error flag from a serialised
    /// `CallToolResult`.
    #[must_use]
    pub fn from_call_result(payload: &Value) -> Self {
        let content = payload
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            content,
            is_error: payload
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An initialised MCP client session.
#[async_trait]
pub trait McpSession: Send {
    /// Calls `name` with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Mcp`] when the request fails.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ExecutorResult<McpToolOutput>;

    /// Lists the names of the server's tools.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Mcp`] when the request fails.
    async fn list_tools(&mut self) -> ExecutorResult<Vec<String>>;

    /// Shuts the session and its transport down.
    async fn close(self: Box<Self>);
}

/// Opens sessions to rendered server descriptors.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Connects and initialises a session.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport cannot be established or the
    /// handshake fails.
    async fn connect(&self, server: &McpServer) -> ExecutorResult<Box<dyn McpSession>>;
}

/// Connector backed by the `rmcp` client (child-process stdio and
/// streamable HTTP transports).
#[derive(Debug, Clone, Copy, Default)]
pub struct RmcpConnector;

#[async_trait]
impl McpConnector for RmcpConnector {
    async fn connect(&self, server: &McpServer) -> ExecutorResult<Box<dyn McpSession>> {
        let service = match server {
            McpServer::Stdio(stdio) => {
                // Entries in `env` override the inherited process environment.
                let command = Command::new(&stdio.command).configure(|cmd| {
                    cmd.args(&stdio.args).envs(&stdio.env);
                });
                let transport = TokioChildProcess::new(command).map_err(|err| {
                    ExecutorError::Spawn {
                        command: stdio.command.clone(),
                        reason: err.to_string(),
                    }
                })?;
                ().serve(transport).await.map_err(|err| {
                    ExecutorError::mcp(format!("failed to initialise stdio session: {err}"))
                })?
            }
            McpServer::Http(http) => {
                let client = reqwest::Client::builder()
                    .default_headers(header_map(&http.headers)?)
                    .build()
                    .map_err(|err| {
                        ExecutorError::transport(format!("failed to build HTTP client: {err}"))
                    })?;
                let transport = StreamableHttpClientTransport::with_client(
                    client,
                    StreamableHttpClientTransportConfig::with_uri(http.url.clone()),
                );
                ().serve(transport).await.map_err(|err| {
                    ExecutorError::mcp(format!("failed to initialise HTTP session: {err}"))
                })?
            }
        };
        Ok(Box::new(RmcpSession { service }))
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> ExecutorResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            ExecutorError::invalid_config(format!("invalid header name `{name}`: {err}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|err| {
            ExecutorError::invalid_config(format!("invalid value for header `{name}`: {err}"))
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

struct RmcpSession {
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl McpSession for RmcpSession {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ExecutorResult<McpToolOutput> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_owned().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|err| ExecutorError::mcp(err.to_string()))?;
        let payload = serde_json::to_value(&result)
            .map_err(|err| ExecutorError::mcp(format!("unreadable tool result: {err}")))?;
        Ok(McpToolOutput::from_call_result(&payload))
    }

    async fn list_tools(&mut self) -> ExecutorResult<Vec<String>> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|err| ExecutorError::mcp(err.to_string()))?;
        Ok(tools.into_iter().map(|tool| tool.name.to_string()).collect())
    }

    async fn close(self: Box<Self>) {
        if let Err(err) = self.service.cancel().await {
            warn!(error = %err, "failed to shut down MCP session");
        }
    }
}

/// Executes [`McpConfig`] tools against registered servers.
pub struct McpExecutor {
    servers: HashMap<String, McpServer>,
    connector: Arc<dyn McpConnector>,
    engine: TemplateEngine,
    timeout: Duration,
}

impl fmt::Debug for McpExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpExecutor")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for McpExecutor {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl McpExecutor {
    /// Creates an executor over the supplied server descriptors using the
    /// `rmcp` client.
    #[must_use]
    pub fn new(servers: HashMap<String, McpServer>) -> Self {
        Self {
            servers,
            connector: Arc::new(RmcpConnector),
            engine: TemplateEngine::new(),
            timeout: DEFAULT_MCP_TIMEOUT,
        }
    }

    /// Replaces the session connector.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn McpConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Sets the limit applied to each connect and each request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers or replaces a server descriptor.
    pub fn register_server(&mut self, name: impl Into<String>, server: McpServer) {
        self.servers.insert(name.into(), server);
    }

    /// Returns the descriptor registered under `name`.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&McpServer> {
        self.servers.get(name)
    }

    /// Renders a descriptor's string fields against the environment only.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Template`] when a placeholder fails, which
    /// includes any `{{props.*}}` reference.
    pub fn render_server(&self, server: &McpServer, ctx: &Context) -> ExecutorResult<McpServer> {
        let ctx = ctx.env_only();
        let render = |text: &str| self.engine.render_basic(text, &ctx);
        let render_map = |map: &BTreeMap<String, String>| {
            map.iter()
                .map(|(key, value)| Ok((key.clone(), render(value)?)))
                .collect::<ExecutorResult<BTreeMap<_, _>>>()
        };

        Ok(match server {
            McpServer::Stdio(stdio) => McpServer::Stdio(StdioServer {
                command: render(&stdio.command)?,
                args: stdio
                    .args
                    .iter()
                    .map(|arg| render(arg))
                    .collect::<Result<_, _>>()?,
                env: render_map(&stdio.env)?,
            }),
            McpServer::Http(http) => McpServer::Http(HttpServer {
                url: render(&http.url)?,
                headers: render_map(&http.headers)?,
            }),
        })
    }

    /// Lists tool names exposed by a registered server.
    ///
    /// # Errors
    ///
    /// Returns an error when the server is unknown, templating fails, or the
    /// session cannot be established or answered within the timeout.
    pub async fn list_tools(&self, server_name: &str, ctx: &Context) -> ExecutorResult<Vec<String>> {
        let mut session = self.open(server_name, ctx).await?;
        let outcome = timeout(self.timeout, session.list_tools()).await;
        session.close().await;
        outcome.map_err(|_| ExecutorError::timeout("MCP list_tools", self.timeout))?
    }

    async fn open(&self, server_name: &str, ctx: &Context) -> ExecutorResult<Box<dyn McpSession>> {
        let server = self
            .servers
            .get(server_name)
            .ok_or_else(|| ExecutorError::UnknownServer {
                name: server_name.to_owned(),
            })?;
        let server = self.render_server(server, ctx)?;
        debug!(server = server_name, "opening MCP session");
        timeout(self.timeout, self.connector.connect(&server))
            .await
            .map_err(|_| ExecutorError::timeout("MCP connect", self.timeout))?
    }

    async fn run(&self, config: &McpConfig, ctx: &Context) -> ExecutorResult<ExecutionResult> {
        let mut session = self.open(&config.server_name, ctx).await?;
        let outcome = timeout(
            self.timeout,
            session.call_tool(&config.tool_name, ctx.props().clone()),
        )
        .await;
        session.close().await;

        let output = outcome
            .map_err(|_| ExecutorError::timeout("MCP tool call", self.timeout))?
            .map_err(|err| {
                ExecutorError::mcp(format!(
                    "Failed to execute MCP tool '{}': {err}",
                    config.tool_name
                ))
            })?;

        let result = if output.is_error {
            warn!(
                server = %config.server_name,
                tool = %config.tool_name,
                "remote tool reported an error"
            );
            let text = output.text();
            ExecutionResult::failure(if text.trim().is_empty() {
                format!("MCP tool '{}' reported an error", config.tool_name)
            } else {
                text
            })
        } else {
            ExecutionResult::success(output.content)
        };

        Ok(result
            .with_metadata("mcp_server", config.server_name.clone())
            .with_metadata("mcp_tool", config.tool_name.clone()))
    }
}

#[async_trait]
impl Executor for McpExecutor {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Mcp
    }

    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
        let ExecutionConfig::Mcp(mcp) = config else {
            return mismatch(ExecutionKind::Mcp, config);
        };
        self.run(mcp, ctx)
            .await
            .unwrap_or_else(ExecutionResult::from)
    }
}
