//! In-memory command runner fake (testing only)
//!
//! [`RecordingRunner`] satisfies [`CommandRunner`] without spawning
//! processes: it records each invocation and answers from scripted rules.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::BootstrapError;
use crate::runner::{CommandResult, CommandRunner, Invocation};
use crate::Result;

type Matcher = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;
type Effect = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Scripted answer for a matching invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Behave as if the program is not installed.
    Missing,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Reply::Exit {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

struct Rule {
    matcher: Matcher,
    reply: Option<Reply>,
    effect: Option<Effect>,
}

/// Records invocations; unmatched commands exit 0 with no output.
#[derive(Default)]
pub struct RecordingRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations matching `matcher` with `reply`. First match wins.
    pub fn reply_when<F>(mut self, matcher: F, reply: Reply) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            reply: Some(reply),
            effect: None,
        });
        self
    }

    /// Run `effect` whenever an invocation matches, before replying.
    pub fn on_call<F, E>(mut self, matcher: F, effect: E) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
        E: Fn(&Invocation) + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            reply: None,
            effect: Some(Box::new(effect)),
        });
        self
    }

    /// Every invocation seen so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every invocation seen so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    /// Number of invocations whose arguments start with `prefix`.
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandResult> {
        self.calls.lock().unwrap().push(invocation.clone());

        for rule in self.rules.iter().filter(|r| (r.matcher)(invocation)) {
            if let Some(effect) = &rule.effect {
                effect(invocation);
            }
        }

        let reply = self
            .rules
            .iter()
            .filter(|r| (r.matcher)(invocation))
            .find_map(|r| r.reply.clone())
            .unwrap_or_else(|| Reply::ok(""));

        match reply {
            Reply::Exit {
                code,
                stdout,
                stderr,
            } => Ok(CommandResult {
                invocation: invocation.clone(),
                exit_code: code,
                stdout,
                stderr,
            }),
            Reply::Missing => Err(BootstrapError::Execution {
                command: invocation.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{}: not found", invocation.program),
                ),
            }),
        }
    }
}
