//! `docker compose` lifecycle: stop, start and status of the stack.

use crate::config::RunConfig;
use crate::runner::{path_arg, Check, CommandRunner, Invocation};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// A compose stack addressed by project name and manifest.
///
/// Paths are held as validated UTF-8 so docker receives exactly the path
/// that was checked on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    pub docker_bin: String,
    pub project_name: String,
    pub compose_file: String,
    pub env_file: String,
}

/// Result of the best-effort stop before startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    /// `down` failed or could not run; usually nothing was running.
    Failed { exit_code: Option<i32> },
}

/// One entry of `docker compose ps --format json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: String,
}

impl ServiceState {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Per-service state of the stack
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackStatus {
    pub services: Vec<ServiceState>,
}

impl StackStatus {
    /// Accepts both a JSON array (older compose) and one object per line.
    pub fn parse(stdout: &str) -> serde_json::Result<Self> {
        let trimmed = stdout.trim();
        let services = if trimmed.is_empty() {
            Vec::new()
        } else if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)?
        } else {
            trimmed
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str::<ServiceState>)
                .collect::<serde_json::Result<Vec<_>>>()?
        };
        Ok(StackStatus { services })
    }

    pub fn running_count(&self) -> usize {
        self.services.iter().filter(|s| s.is_running()).count()
    }

    /// At least one service, and every service running.
    pub fn all_running(&self) -> bool {
        !self.services.is_empty() && self.running_count() == self.services.len()
    }
}

impl ComposeProject {
    pub fn new(cfg: &RunConfig, compose_file: &Path) -> Result<Self> {
        Ok(ComposeProject {
            docker_bin: cfg.docker_bin.clone(),
            project_name: cfg.project_name.clone(),
            compose_file: path_arg(compose_file)?,
            env_file: path_arg(&cfg.env_file)?,
        })
    }

    fn invocation(&self, action: &[&str]) -> Invocation {
        let mut args = vec![
            "compose",
            "-p",
            self.project_name.as_str(),
            "-f",
            self.compose_file.as_str(),
            "--env-file",
            self.env_file.as_str(),
        ];
        args.extend_from_slice(action);
        Invocation::new(&self.docker_bin, args)
    }

    pub fn down_command(&self) -> Invocation {
        self.invocation(&["down"])
    }

    pub fn up_command(&self, detach: bool) -> Invocation {
        if detach {
            self.invocation(&["up", "-d"])
        } else {
            self.invocation(&["up"])
        }
    }

    pub fn ps_command(&self) -> Invocation {
        self.invocation(&["ps", "--format", "json"])
    }

    /// Stop any previous stack under this project name. Never fails.
    pub async fn stop_existing<R>(&self, runner: &R) -> StopOutcome
    where
        R: CommandRunner + ?Sized,
    {
        info!(
            "Stopping and removing existing containers for project '{}'",
            self.project_name
        );
        match runner.run(&self.down_command(), Check::Tolerate).await {
            Ok(result) if result.success() => {
                info!("Existing containers stopped and removed");
                StopOutcome::Stopped
            }
            Ok(result) => {
                warn!("No existing containers found or error stopping them");
                StopOutcome::Failed {
                    exit_code: Some(result.exit_code),
                }
            }
            Err(e) => {
                warn!("Could not stop existing containers: {}", e);
                StopOutcome::Failed { exit_code: None }
            }
        }
    }

    /// Stop the stack, failing on a non-zero exit.
    pub async fn stop<R>(&self, runner: &R) -> Result<()>
    where
        R: CommandRunner + ?Sized,
    {
        runner.run(&self.down_command(), Check::Fatal).await?;
        info!("Project '{}' stopped", self.project_name);
        Ok(())
    }

    /// Bring the stack up. A non-zero exit is an error.
    pub async fn start<R>(&self, runner: &R, detach: bool) -> Result<()>
    where
        R: CommandRunner + ?Sized,
    {
        info!("Starting services with project name '{}'", self.project_name);
        runner.run(&self.up_command(detach), Check::Fatal).await?;
        info!("Services started successfully");
        Ok(())
    }

    /// Query per-service state.
    pub async fn status<R>(&self, runner: &R) -> Result<StackStatus>
    where
        R: CommandRunner + ?Sized,
    {
        let result = runner.run(&self.ps_command(), Check::Fatal).await?;
        let status = StackStatus::parse(&result.stdout).unwrap_or_else(|e| {
            warn!("Could not parse compose ps output: {}", e);
            StackStatus::default()
        });

        for service in &status.services {
            info!(
                service = %service.service,
                state = %service.state,
                health = %service.health,
                "{}", service.name
            );
        }
        Ok(status)
    }
}
