//! Error types for supabase-local

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while bootstrapping the local stack
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The external tool is missing or could not be started
    #[error("failed to execute `{command}`: {source}")]
    Execution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran but exited non-zero
    #[error("`{command}` exited with code {code}: {}", summarize(.stderr, .stdout))]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// Reading or writing a path failed
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No docker-compose.yml under the repository
    #[error("no docker-compose.yml found under {}", .0.display())]
    ComposeFileNotFound(PathBuf),

    /// A required tool failed its preflight check
    #[error("{0} is not available")]
    ToolUnavailable(String),

    /// A path that cannot be passed to git or docker unchanged
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Malformed `KEY=VALUE` override
    #[error("invalid environment pair `{0}`, expected KEY=VALUE")]
    InvalidEnvPair(String),
}

impl BootstrapError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BootstrapError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Exit code of the failed command, if this error came from one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BootstrapError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// Prefer stderr, fall back to stdout, keep the message to one line.
fn summarize(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() {
        stdout
    } else {
        stderr
    };
    text.trim().lines().last().unwrap_or("no output").to_string()
}
