//! External command execution.
//!
//! Every shell-out goes through [`CommandRunner`] so stages can be driven by
//! [`SystemRunner`] in production and by a recording fake in tests.

use crate::error::BootstrapError;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

/// One external command: program, arguments, optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Run from `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Whether `arg` appears anywhere in the argument list.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Whether the arguments start with `prefix`, e.g. `["compose"]`.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// `path` as a command argument; non-UTF-8 paths are rejected rather than
/// lossily converted.
pub fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| BootstrapError::NonUtf8Path(path.to_path_buf()))
}

/// Outcome of one invocation.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub invocation: Invocation,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn into_failure(self) -> BootstrapError {
        BootstrapError::CommandFailed {
            command: self.invocation.to_string(),
            code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// How a non-zero exit is surfaced by [`CommandRunner::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Non-zero exit becomes [`BootstrapError::CommandFailed`].
    Fatal,
    /// Non-zero exit is returned as a result for the caller to inspect.
    Tolerate,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Spawn the command, wait for it and capture its output.
    ///
    /// Returns [`BootstrapError::Execution`] only when the process could not
    /// be started; a non-zero exit is still `Ok`.
    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult>;

    /// Whether captured stdout of successful commands is logged at info
    /// rather than debug.
    fn verbose(&self) -> bool {
        false
    }

    /// Execute and log the outcome, classifying non-zero exits per `check`.
    async fn run(&self, invocation: &Invocation, check: Check) -> Result<CommandResult> {
        info!("Running: {}", invocation);

        let result = match self.execute(invocation).await {
            Ok(result) => result,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };

        if result.success() {
            let stdout = result.stdout.trim_end();
            if !stdout.trim().is_empty() {
                if self.verbose() {
                    info!("{}", stdout);
                } else {
                    debug!("{}", stdout);
                }
            }
            return Ok(result);
        }

        error!("Command failed with exit code {}", result.exit_code);
        if !result.stdout.trim().is_empty() {
            error!("Standard output: {}", result.stdout.trim_end());
        }
        if !result.stderr.trim().is_empty() {
            error!("Standard error: {}", result.stderr.trim_end());
        }

        match check {
            Check::Fatal => Err(result.into_failure()),
            Check::Tolerate => Ok(result),
        }
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    verbose: bool,
}

impl SystemRunner {
    /// With `verbose`, captured stdout is logged at info instead of debug.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|source| BootstrapError::Execution {
                command: invocation.to_string(),
                source,
            })?;

        let result = CommandResult {
            invocation: invocation.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        Ok(result)
    }

    fn verbose(&self) -> bool {
        self.verbose
    }
}
