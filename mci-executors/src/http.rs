//! HTTP executor.
//!
//! Every string field of an [`HttpConfig`] (URL, header values, params, body
//! and auth values) is rendered with placeholder substitution before the
//! request is built. Non-2xx responses are error results that still carry the
//! status, headers and body in metadata.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hyper::body::to_bytes;
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request, StatusCode, Uri};
use mci_primitives::{
    ApiKeyLocation, AuthConfig, Context, ExecutionConfig, ExecutionKind, ExecutionResult,
    HttpBody, HttpConfig,
};
use mci_templates::{TemplateEngine, stringify};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::http_client::{HyperClient, build_https_client};
use crate::traits::{
    Executor, ExecutorError, ExecutorResult, backoff_delay, mismatch, timeout_from_ms,
};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Executes [`HttpConfig`] tools over a shared hyper client.
pub struct HttpExecutor {
    client: HyperClient,
    engine: TemplateEngine,
}

impl fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExecutor").finish_non_exhaustive()
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct PreparedRequest {
    method: Method,
    uri: Uri,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

struct HttpResponse {
    status: StatusCode,
    headers: Map<String, Value>,
    body: String,
}

impl HttpResponse {
    fn into_success(self) -> ExecutionResult {
        ExecutionResult::text(self.body)
            .with_metadata("status_code", self.status.as_u16())
            .with_metadata("headers", Value::Object(self.headers))
    }

    fn into_failure(self) -> ExecutionResult {
        ExecutionResult::failure(format!("HTTP request failed with status {}", self.status))
            .with_metadata("status_code", self.status.as_u16())
            .with_metadata("headers", Value::Object(self.headers))
            .with_metadata("body", self.body)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl HttpExecutor {
    /// Creates an executor with a rustls-backed client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: build_https_client(),
            engine: TemplateEngine::new(),
        }
    }

    async fn run(&self, config: &HttpConfig, ctx: &Context) -> ExecutorResult<ExecutionResult> {
        let limit = timeout_from_ms(config.timeout_ms);
        let prepared = self.prepare(config, ctx, limit).await?;
        let retry = config.retries.unwrap_or_default();
        let attempts = retry.attempts.max(1);

        let mut attempt = 1;
        loop {
            let failure = match self.send(&prepared, limit).await {
                Ok(response) if response.status.is_success() => {
                    debug!(
                        method = %prepared.method,
                        status = response.status.as_u16(),
                        attempt,
                        "http request succeeded"
                    );
                    return Ok(response.into_success());
                }
                Ok(response) => {
                    warn!(
                        status = response.status.as_u16(),
                        attempt, attempts, "http request returned error status"
                    );
                    response.into_failure()
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "http request failed");
                    ExecutionResult::from(err)
                }
            };

            if attempt >= attempts {
                return Ok(failure);
            }
            sleep(backoff_delay(retry.backoff_ms, attempt)).await;
            attempt += 1;
        }
    }

    async fn prepare(
        &self,
        config: &HttpConfig,
        ctx: &Context,
        limit: Duration,
    ) -> ExecutorResult<PreparedRequest> {
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                ExecutorError::invalid_config(format!("unsupported HTTP method `{}`", config.method))
            })?;

        let mut url = self.engine.render_basic(&config.url, ctx)?;

        let mut headers = config
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.engine.render_basic(value, ctx)?)))
            .collect::<ExecutorResult<Vec<_>>>()?;

        let mut query = match &config.params {
            Some(params) => self.render_pairs(params, ctx)?,
            None => Vec::new(),
        };

        let body = match &config.body {
            None => None,
            Some(HttpBody::Json(value)) => {
                let rendered = self.engine.render_value(value, ctx)?;
                set_default_header(&mut headers, CONTENT_TYPE.as_str(), JSON_CONTENT_TYPE);
                Some(serde_json::to_vec(&rendered).map_err(|err| {
                    ExecutorError::invalid_config(format!("failed to encode JSON body: {err}"))
                })?)
            }
            Some(HttpBody::Form(fields)) => {
                let pairs = self.render_pairs(fields, ctx)?;
                set_default_header(&mut headers, CONTENT_TYPE.as_str(), FORM_CONTENT_TYPE);
                Some(encode_pairs(&pairs).into_bytes())
            }
            Some(HttpBody::Raw(text)) => Some(self.engine.render_basic(text, ctx)?.into_bytes()),
        };

        if let Some(auth) = &config.auth {
            self.apply_auth(auth, ctx, limit, &mut headers, &mut query)
                .await?;
        }

        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_pairs(&query));
        }
        let uri = url
            .parse::<Uri>()
            .map_err(|err| ExecutorError::invalid_config(format!("invalid URL: {err}")))?;

        Ok(PreparedRequest {
            method,
            uri,
            headers,
            body,
        })
    }

    fn render_pairs(
        &self,
        fields: &Map<String, Value>,
        ctx: &Context,
    ) -> ExecutorResult<Vec<(String, String)>> {
        fields
            .iter()
            .map(|(name, value)| {
                let rendered = self.engine.render_value(value, ctx)?;
                Ok((name.clone(), stringify(&rendered)))
            })
            .collect()
    }

    async fn apply_auth(
        &self,
        auth: &AuthConfig,
        ctx: &Context,
        limit: Duration,
        headers: &mut Vec<(String, String)>,
        query: &mut Vec<(String, String)>,
    ) -> ExecutorResult<()> {
        let render = |text: &str| self.engine.render_basic(text, ctx);

        match auth {
            AuthConfig::ApiKey {
                location,
                name,
                value,
            } => {
                let value = render(value)?;
                match location {
                    ApiKeyLocation::Header => set_header(headers, name, value),
                    ApiKeyLocation::Query => query.push((name.clone(), value)),
                }
            }
            AuthConfig::Bearer { token } => {
                let token = render(token)?;
                set_header(headers, AUTHORIZATION.as_str(), format!("Bearer {token}"));
            }
            AuthConfig::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", render(username)?, render(password)?));
                set_header(headers, AUTHORIZATION.as_str(), format!("Basic {credentials}"));
            }
            AuthConfig::OAuth2 {
                flow,
                token_url,
                client_id,
                client_secret,
                scopes,
            } => {
                if !matches!(flow.as_str(), "clientCredentials" | "client_credentials") {
                    return Err(ExecutorError::invalid_config(format!(
                        "unsupported OAuth2 flow `{flow}`"
                    )));
                }
                let token = self
                    .fetch_token(
                        &render(token_url)?,
                        &render(client_id)?,
                        &render(client_secret)?,
                        scopes.as_deref().unwrap_or_default(),
                        limit,
                    )
                    .await?;
                set_header(headers, AUTHORIZATION.as_str(), format!("Bearer {token}"));
            }
        }
        Ok(())
    }

    async fn fetch_token(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
        limit: Duration,
    ) -> ExecutorResult<String> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_owned()),
            ("client_id", client_id.to_owned()),
            ("client_secret", client_secret.to_owned()),
        ];
        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }

        let request = Request::post(token_url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .body(Body::from(encode_pairs(&form)))
            .map_err(|err| {
                ExecutorError::invalid_config(format!("invalid OAuth2 token request: {err}"))
            })?;

        let exchange = async {
            let response = self.client.request(request).await.map_err(|err| {
                ExecutorError::transport(format!("OAuth2 token request failed: {err}"))
            })?;
            let status = response.status();
            let bytes = to_bytes(response.into_body()).await.map_err(|err| {
                ExecutorError::transport(format!("failed to read OAuth2 token response: {err}"))
            })?;
            Ok::<_, ExecutorError>((status, bytes))
        };
        let (status, bytes) = timeout(limit, exchange)
            .await
            .map_err(|_| ExecutorError::timeout("OAuth2 token request", limit))??;
        if !status.is_success() {
            return Err(ExecutorError::transport(format!(
                "OAuth2 token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = serde_json::from_slice(&bytes).map_err(|err| {
            ExecutorError::transport(format!("invalid OAuth2 token response: {err}"))
        })?;
        debug!("obtained OAuth2 access token");
        Ok(token.access_token)
    }

    async fn send(
        &self,
        prepared: &PreparedRequest,
        limit: Duration,
    ) -> ExecutorResult<HttpResponse> {
        let mut builder = Request::builder()
            .method(prepared.method.clone())
            .uri(prepared.uri.clone());
        for (name, value) in &prepared.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = prepared
            .body
            .as_ref()
            .map_or_else(Body::empty, |bytes| Body::from(bytes.clone()));
        let request = builder
            .body(body)
            .map_err(|err| ExecutorError::invalid_config(format!("invalid HTTP request: {err}")))?;

        // The limit covers the body as well as the response head.
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|err| ExecutorError::transport(format!("HTTP request failed: {err}")))?;

            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                    )
                })
                .collect();
            let bytes = to_bytes(response.into_body()).await.map_err(|err| {
                ExecutorError::transport(format!("failed to read HTTP response: {err}"))
            })?;

            Ok(HttpResponse {
                status,
                headers,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        };
        timeout(limit, exchange)
            .await
            .map_err(|_| ExecutorError::timeout("HTTP request", limit))?
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Http
    }

    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
        let ExecutionConfig::Http(http) = config else {
            return mismatch(ExecutionKind::Http, config);
        };
        self.run(http, ctx)
            .await
            .unwrap_or_else(ExecutionResult::from)
    }
}

/// Replaces any header of the same name, ignoring case.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_owned(), value));
}

fn set_default_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if !headers
        .iter()
        .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    {
        headers.push((name.to_owned(), value.to_owned()));
    }
}

fn encode_pairs<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name.as_ref()),
                urlencoding::encode(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
