//! Observability utilities for MCI.
//!
//! Only structured logging is provided: a `tracing-subscriber` formatter
//! filtered through [`EnvFilter`].

#![warn(missing_docs, clippy::pedantic)]

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

/// Primary variable holding the filter directive.
pub const LOG_ENV: &str = "MCI_LOG";

/// Fallback variable consulted when [`LOG_ENV`] is unset.
pub const FALLBACK_LOG_ENV: &str = "RUST_LOG";

/// Selects the filter directive: `MCI_LOG`, then `RUST_LOG`, then
/// `default_directive`.
#[must_use]
pub fn filter_directive(
    default_directive: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    [LOG_ENV, FALLBACK_LOG_ENV]
        .into_iter()
        .filter_map(&lookup)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_directive.to_owned())
}

/// Installs the global `fmt` subscriber.
///
/// Calling it again after a subscriber is installed is a no-op.
///
/// # Errors
///
/// Returns an error when the selected directive cannot be parsed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let directive = filter_directive(default_directive, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter `{directive}`"))?;

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
