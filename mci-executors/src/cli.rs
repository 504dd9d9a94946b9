//! CLI executor.
//!
//! Builds an argument vector (program, positional args, then flags) and
//! hands it to a [`ProcessRunner`]. The default runner execs the program
//! directly; no shell ever sees the rendered values, so each templated value
//! is exactly one argv element.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mci_primitives::{
    CliConfig, Context, ExecutionConfig, ExecutionKind, ExecutionResult, FlagKind,
};
use mci_templates::{TemplateEngine, is_truthy, stringify};
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::traits::{Executor, ExecutorError, ExecutorResult, mismatch, timeout_from_ms};

/// Exit code reported when the process ended without one (killed by signal).
const SIGNALLED_EXIT_CODE: i32 = -1;

/// Fully rendered process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl CommandSpec {
    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments following the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, when configured.
    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Wall-clock limit for the process.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Program followed by its arguments.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// Captured outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Runs a [`CommandSpec`] to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Executes the command and captures its output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Spawn`] when the process cannot start and
    /// [`ExecutorError::Timeout`] when it outlives its limit.
    async fn run(&self, spec: &CommandSpec) -> ExecutorResult<ProcessOutput>;
}

/// Runner backed by [`tokio::process::Command`].
///
/// The child is killed when the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> ExecutorResult<ProcessOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|err| ExecutorError::Spawn {
            command: spec.program.clone(),
            reason: err.to_string(),
        })?;

        // Dropping the output future drops the child, which kills it.
        let output = timeout(spec.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutorError::timeout("command", spec.timeout))?
            .map_err(|err| ExecutorError::Spawn {
                command: spec.program.clone(),
                reason: err.to_string(),
            })?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Executes [`CliConfig`] tools.
pub struct CliExecutor {
    runner: Arc<dyn ProcessRunner>,
    engine: TemplateEngine,
}

impl fmt::Debug for CliExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliExecutor").finish_non_exhaustive()
    }
}

impl Default for CliExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CliExecutor {
    /// Creates an executor that spawns real processes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(Arc::new(TokioProcessRunner))
    }

    /// Creates an executor with a custom runner.
    #[must_use]
    pub fn with_runner(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            engine: TemplateEngine::new(),
        }
    }

    /// Renders `config` into a process invocation.
    ///
    /// Flags follow positional arguments in declaration order. A flag whose
    /// `from` path does not resolve is omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Template`] when the command, an argument or
    /// the working directory fails to render.
    pub fn build_command(&self, config: &CliConfig, ctx: &Context) -> ExecutorResult<CommandSpec> {
        let program = self.engine.render_basic(&config.command, ctx)?;
        if program.trim().is_empty() {
            return Err(ExecutorError::invalid_config("command must not be empty"));
        }

        let mut args = config
            .args
            .iter()
            .map(|arg| self.engine.render_basic(arg, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        for (token, flag) in config.flags.iter() {
            let Ok(value) = self.engine.lookup(&flag.from, ctx) else {
                continue;
            };
            match flag.kind {
                FlagKind::Boolean => {
                    if is_truthy(&value) {
                        args.push(token.to_owned());
                    }
                }
                FlagKind::Value => {
                    if !value.is_null() {
                        args.push(token.to_owned());
                        args.push(stringify(&value));
                    }
                }
            }
        }

        let cwd = config
            .cwd
            .as_deref()
            .map(|cwd| self.engine.render_basic(cwd, ctx))
            .transpose()?
            .map(PathBuf::from);

        Ok(CommandSpec {
            program,
            args,
            cwd,
            timeout: timeout_from_ms(config.timeout_ms),
        })
    }

    async fn run(&self, config: &CliConfig, ctx: &Context) -> ExecutorResult<ExecutionResult> {
        let spec = self.build_command(config, ctx)?;
        debug!(
            command = %config.command,
            args = spec.args.len(),
            timeout_secs = spec.timeout.as_secs(),
            "running command"
        );

        let output = self.runner.run(&spec).await?;
        let code = output.code.unwrap_or(SIGNALLED_EXIT_CODE);

        if code == 0 {
            let result = if output.stdout.is_empty() {
                ExecutionResult::success(Vec::new())
            } else {
                ExecutionResult::text(output.stdout)
            };
            return Ok(result
                .with_metadata("returncode", code)
                .with_metadata("stderr", output.stderr));
        }

        warn!(command = %config.command, code, "command exited with non-zero status");
        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            format!("Command exited with code {code}")
        } else {
            format!("Command exited with code {code}: {stderr}")
        };
        Ok(ExecutionResult::failure(message)
            .with_metadata("returncode", code)
            .with_metadata("stdout", Value::String(output.stdout))
            .with_metadata("stderr", Value::String(output.stderr)))
    }
}

#[async_trait]
impl Executor for CliExecutor {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Cli
    }

    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
        let ExecutionConfig::Cli(cli) = config else {
            return mismatch(ExecutionKind::Cli, config);
        };
        self.run(cli, ctx)
            .await
            .unwrap_or_else(ExecutionResult::from)
    }
}
