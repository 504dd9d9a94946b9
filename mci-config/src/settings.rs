//! Process-level runtime settings.

use std::time::Duration;

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding the MCP round-trip timeout.
pub const MCP_TIMEOUT_ENV: &str = "MCI_MCP_TIMEOUT_MS";

/// MCP round-trip timeout applied when nothing overrides it.
pub const DEFAULT_MCP_TIMEOUT_MS: u64 = 60_000;

/// Settings that apply to every tool rather than to one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    mcp_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            mcp_timeout: Duration::from_millis(DEFAULT_MCP_TIMEOUT_MS),
        }
    }
}

impl RuntimeSettings {
    /// Reads settings from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and
    /// ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(raw) = lookup(MCP_TIMEOUT_ENV) {
            match parse_millis(MCP_TIMEOUT_ENV, &raw) {
                Ok(timeout) => settings.mcp_timeout = timeout,
                Err(err) => warn!(error = %err, "ignoring runtime setting"),
            }
        }
        settings
    }

    /// Overrides the MCP round-trip timeout.
    #[must_use]
    pub const fn with_mcp_timeout(mut self, timeout: Duration) -> Self {
        self.mcp_timeout = timeout;
        self
    }

    /// Limit applied to each MCP connect and request.
    #[must_use]
    pub const fn mcp_timeout(&self) -> Duration {
        self.mcp_timeout
    }
}

fn parse_millis(variable: &'static str, raw: &str) -> ConfigResult<Duration> {
    let millis: u64 = raw.trim().parse().map_err(|err| ConfigError::InvalidEnv {
        variable,
        reason: format!("`{raw}` is not a number of milliseconds: {err}"),
    })?;
    if millis == 0 {
        return Err(ConfigError::InvalidEnv {
            variable,
            reason: "timeout must be positive".into(),
        });
    }
    Ok(Duration::from_millis(millis))
}
