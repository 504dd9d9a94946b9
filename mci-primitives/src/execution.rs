//! Execution configuration variants.
//!
//! String fields are templatable: placeholders are resolved by executors at
//! execution time, never at load time.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timeout applied when a config leaves `timeout_ms` unset.
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;

fn default_timeout_ms() -> i64 {
    DEFAULT_TIMEOUT_MS
}

fn default_method() -> String {
    "GET".to_owned()
}

const fn default_true() -> bool {
    true
}

/// Discriminant of an [`ExecutionConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    /// HTTP request.
    Http,
    /// Subprocess invocation.
    Cli,
    /// File read.
    File,
    /// Literal text.
    Text,
    /// Remote MCP tool call.
    Mcp,
}

impl ExecutionKind {
    /// Returns the wire spelling of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Cli => "cli",
            Self::File => "file",
            Self::Text => "text",
            Self::Mcp => "mcp",
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of execution configurations, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutionConfig {
    /// HTTP request configuration.
    Http(HttpConfig),
    /// Command-line invocation configuration.
    Cli(CliConfig),
    /// File read configuration.
    File(FileConfig),
    /// Literal text configuration.
    Text(TextConfig),
    /// MCP proxied tool configuration.
    Mcp(McpConfig),
}

impl ExecutionConfig {
    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> ExecutionKind {
        match self {
            Self::Http(_) => ExecutionKind::Http,
            Self::Cli(_) => ExecutionKind::Cli,
            Self::File(_) => ExecutionKind::File,
            Self::Text(_) => ExecutionKind::Text,
            Self::Mcp(_) => ExecutionKind::Mcp,
        }
    }
}

/// HTTP execution configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP method, `GET` by default.
    #[serde(default = "default_method")]
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Optional authentication scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    /// Query parameters appended to the URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    /// Optional request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<HttpBody>,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
    /// Optional retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryConfig>,
}

impl HttpConfig {
    /// Creates a `GET` configuration for the supplied URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            headers: BTreeMap::new(),
            auth: None,
            params: None,
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: None,
        }
    }
}

/// Location of an API key credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    /// Sent as a request header.
    Header,
    /// Sent as a query parameter.
    Query,
}

/// Authentication schemes supported by the HTTP executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthConfig {
    /// API key in a header or query parameter.
    #[serde(rename = "apiKey")]
    ApiKey {
        /// Where the key is placed.
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        /// Header or parameter name.
        name: String,
        /// Key value.
        value: String,
    },
    /// Bearer token in the `Authorization` header.
    #[serde(rename = "bearer")]
    Bearer {
        /// Token value.
        token: String,
    },
    /// HTTP basic authentication.
    #[serde(rename = "basic")]
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// OAuth2 client-credentials flow.
    #[serde(rename = "oauth2")]
    OAuth2 {
        /// Grant flow, only `clientCredentials` is supported.
        flow: String,
        /// Token endpoint.
        #[serde(rename = "tokenUrl")]
        token_url: String,
        /// Client identifier.
        #[serde(rename = "clientId")]
        client_id: String,
        /// Client secret.
        #[serde(rename = "clientSecret")]
        client_secret: String,
        /// Requested scopes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scopes: Option<Vec<String>>,
    },
}

/// HTTP request body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum HttpBody {
    /// JSON document; string leaves are templated.
    Json(Value),
    /// URL-encoded form fields.
    Form(Map<String, Value>),
    /// Raw string body.
    Raw(String),
}

/// Retry policy for HTTP requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, at least one.
    #[serde(default = "RetryConfig::default_attempts")]
    pub attempts: u32,
    /// Base delay between attempts in milliseconds.
    #[serde(default = "RetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryConfig {
    const fn default_attempts() -> u32 {
        1
    }

    const fn default_backoff_ms() -> u64 {
        500
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: Self::default_attempts(),
            backoff_ms: Self::default_backoff_ms(),
        }
    }
}

/// Command-line execution configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Program to run. Never interpreted by a shell.
    pub command: String,
    /// Positional arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Flags keyed by flag token, emitted in declaration order.
    #[serde(default, skip_serializing_if = "CliFlags::is_empty")]
    pub flags: CliFlags,
    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i64,
}

impl CliConfig {
    /// Creates a configuration running `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            flags: CliFlags::default(),
            cwd: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// How a CLI flag consumes its bound value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// Flag token only, present when the value is truthy.
    Boolean,
    /// Flag token followed by the value.
    Value,
}

/// Binding of a CLI flag to a context path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagConfig {
    /// Namespaced path (e.g. `props.verbose`) supplying the value.
    pub from: String,
    /// Flag kind.
    #[serde(rename = "type")]
    pub kind: FlagKind,
}

/// CLI flags in the order they were declared.
///
/// Inserting an existing token replaces its binding in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliFlags {
    entries: Vec<(String, FlagConfig)>,
}

impl CliFlags {
    /// Adds or replaces the binding for `token`.
    pub fn insert(&mut self, token: impl Into<String>, flag: FlagConfig) {
        let token = token.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == token) {
            Some(entry) => entry.1 = flag,
            None => self.entries.push((token, flag)),
        }
    }

    /// Binding for `token`, if declared.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&FlagConfig> {
        self.entries
            .iter()
            .find_map(|(existing, flag)| (existing == token).then_some(flag))
    }

    /// Whether `token` is declared.
    #[must_use]
    pub fn contains_key(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Number of declared flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no flags are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagConfig)> {
        self.entries.iter().map(|(token, flag)| (token.as_str(), flag))
    }
}

impl FromIterator<(String, FlagConfig)> for CliFlags {
    fn from_iter<I: IntoIterator<Item = (String, FlagConfig)>>(iter: I) -> Self {
        let mut flags = Self::default();
        for (token, flag) in iter {
            flags.insert(token, flag);
        }
        flags
    }
}

impl Serialize for CliFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(token, flag)| (token, flag)))
    }
}

impl<'de> Deserialize<'de> for CliFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagsVisitor;

        impl<'de> serde::de::Visitor<'de> for FlagsVisitor {
            type Value = CliFlags;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of flag tokens to flag bindings")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut access: A,
            ) -> Result<CliFlags, A::Error> {
                let mut flags = CliFlags::default();
                while let Some((token, flag)) = access.next_entry::<String, FlagConfig>()? {
                    flags.insert(token, flag);
                }
                Ok(flags)
            }
        }

        deserializer.deserialize_map(FlagsVisitor)
    }
}

/// File execution configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Path of the file to read.
    pub path: String,
    /// Whether the file content is rendered with directives.
    #[serde(rename = "enableTemplating", default = "default_true")]
    pub enable_templating: bool,
}

/// Literal text configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Template text, rendered with directives.
    pub text: String,
}

/// MCP proxied tool configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Registered server name.
    #[serde(rename = "serverName")]
    pub server_name: String,
    /// Remote tool name.
    #[serde(rename = "toolName")]
    pub tool_name: String,
}

/// Connection descriptor of an MCP server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServer {
    /// Local server spoken to over stdio.
    Stdio(StdioServer),
    /// Remote server spoken to over streamable HTTP.
    Http(HttpServer),
}

/// STDIO server descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioServer {
    /// Program to launch.
    pub command: String,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child, layered over the current process env.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// HTTP server descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServer {
    /// Endpoint URL.
    pub url: String,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_selects_variant() {
        let config: ExecutionConfig =
            serde_json::from_value(json!({ "type": "text", "text": "hi" })).unwrap();
        assert_eq!(config.kind(), ExecutionKind::Text);

        let config: ExecutionConfig = serde_json::from_value(json!({
            "type": "mcp",
            "serverName": "github",
            "toolName": "list_repos"
        }))
        .unwrap();
        assert!(matches!(
            config,
            ExecutionConfig::Mcp(McpConfig { ref server_name, .. }) if server_name == "github"
        ));
    }

    #[test]
    fn http_defaults_apply() {
        let config: ExecutionConfig =
            serde_json::from_value(json!({ "type": "http", "url": "https://x.test" })).unwrap();
        let ExecutionConfig::Http(http) = config else {
            panic!("expected http config");
        };
        assert_eq!(http.method, "GET");
        assert_eq!(http.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(http.retries.is_none());
    }

    #[test]
    fn auth_and_body_parse() {
        let http: HttpConfig = serde_json::from_value(json!({
            "method": "POST",
            "url": "https://x.test",
            "auth": { "type": "apiKey", "in": "query", "name": "key", "value": "{{env.K}}" },
            "body": { "type": "json", "content": { "q": "{{props.q}}" } },
            "retries": { "attempts": 3 }
        }))
        .unwrap();
        assert!(matches!(
            http.auth,
            Some(AuthConfig::ApiKey { location: ApiKeyLocation::Query, .. })
        ));
        assert!(matches!(http.body, Some(HttpBody::Json(_))));
        assert_eq!(http.retries.unwrap().backoff_ms, 500);
    }

    #[test]
    fn cli_flags_parse() {
        let cli: CliConfig = serde_json::from_value(json!({
            "command": "grep",
            "args": ["{{props.pattern}}"],
            "flags": {
                "-i": { "from": "props.ignore_case", "type": "boolean" },
                "--max-count": { "from": "props.max", "type": "value" }
            }
        }))
        .unwrap();
        assert_eq!(cli.flags.get("-i").unwrap().kind, FlagKind::Boolean);
        assert_eq!(cli.flags.get("--max-count").unwrap().from, "props.max");
    }

    #[test]
    fn cli_flags_keep_declaration_order() {
        let cli: CliConfig = serde_json::from_str(
            r#"{
                "command": "tool",
                "flags": {
                    "-v": { "from": "props.verbose", "type": "boolean" },
                    "--output": { "from": "props.out", "type": "value" },
                    "-a": { "from": "props.all", "type": "boolean" }
                }
            }"#,
        )
        .unwrap();
        let tokens: Vec<_> = cli.flags.iter().map(|(token, _)| token).collect();
        assert_eq!(tokens, ["-v", "--output", "-a"]);

        let round_trip = serde_json::to_string(&cli.flags).unwrap();
        assert!(round_trip.find("-v").unwrap() < round_trip.find("--output").unwrap());
    }

    #[test]
    fn file_templating_defaults_on() {
        let file: FileConfig = serde_json::from_value(json!({ "path": "a.txt" })).unwrap();
        assert!(file.enable_templating);
    }

    #[test]
    fn server_descriptor_shape_selects_transport() {
        let stdio: McpServer =
            serde_json::from_value(json!({ "command": "npx", "args": ["-y", "srv"] })).unwrap();
        assert!(matches!(stdio, McpServer::Stdio(_)));

        let http: McpServer =
            serde_json::from_value(json!({ "url": "http://localhost:8000/mcp" })).unwrap();
        assert!(matches!(http, McpServer::Http(_)));
    }
}
