//! The install sequence and the standalone status/down actions.
//!
//! Stages run strictly in order; each awaits its subprocesses before the next
//! begins:
//! preflight -> acquire repository -> provision env file -> stop -> start ->
//! (detached only) settle and report status.

use crate::compose::{ComposeProject, StackStatus, StopOutcome};
use crate::config::RunConfig;
use crate::env_file::{provision_env_file, EnvOutcome};
use crate::preflight::verify_tools;
use crate::repo::{ensure_repository, require_compose_file, RepoOutcome};
use crate::runner::CommandRunner;
use crate::Result;
use serde::Serialize;
use tracing::{info, warn};

/// Everything one install run did
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub repository: RepoOutcome,
    pub env_file: EnvOutcome,
    pub stop: StopOutcome,
    /// Only queried in detached mode; `None` if skipped or the query failed.
    pub status: Option<StackStatus>,
}

/// Acquire, provision and (re)start the stack.
pub async fn install<R>(runner: &R, cfg: &RunConfig) -> Result<InstallReport>
where
    R: CommandRunner + ?Sized,
{
    info!("Starting Supabase installation");

    cfg.validate()?;
    verify_tools(runner, cfg).await?;

    let repository = ensure_repository(runner, cfg).await?;
    let env_file = provision_env_file(&cfg.env_file, &cfg.env_overrides).await?;

    let compose_file = require_compose_file(&cfg.repo_path)?;
    let project = ComposeProject::new(cfg, &compose_file)?;

    let stop = project.stop_existing(runner).await;
    project.start(runner, cfg.detach).await?;

    let status = if cfg.detach {
        settle_and_report(runner, cfg, &project).await
    } else {
        None
    };

    Ok(InstallReport {
        repository,
        env_file,
        stop,
        status,
    })
}

async fn settle_and_report<R>(
    runner: &R,
    cfg: &RunConfig,
    project: &ComposeProject,
) -> Option<StackStatus>
where
    R: CommandRunner + ?Sized,
{
    if !cfg.settle.is_zero() {
        info!(
            "Waiting {}s for services to initialize",
            cfg.settle.as_secs()
        );
        tokio::time::sleep(cfg.settle).await;
    }

    match project.status(runner).await {
        Ok(status) => {
            log_status_summary(cfg, project, &status);
            Some(status)
        }
        Err(e) => {
            warn!("Failed to check services status: {}", e);
            None
        }
    }
}

fn log_status_summary(cfg: &RunConfig, project: &ComposeProject, status: &StackStatus) {
    if status.all_running() {
        info!(
            "Supabase is running ({} services). Studio: http://localhost:3000, \
             API: http://localhost:8000, PostgreSQL: localhost:5432. \
             Credentials are in {}",
            status.services.len(),
            cfg.env_file.display()
        );
    } else {
        warn!(
            "{} of {} services running. Check the logs with: {} compose -p {} -f {} logs",
            status.running_count(),
            status.services.len(),
            project.docker_bin,
            project.project_name,
            project.compose_file
        );
    }
}

/// Report the state of an already-installed stack.
pub async fn status<R>(runner: &R, cfg: &RunConfig) -> Result<StackStatus>
where
    R: CommandRunner + ?Sized,
{
    cfg.validate()?;
    let compose_file = require_compose_file(&cfg.repo_path)?;
    let project = ComposeProject::new(cfg, &compose_file)?;
    let status = project.status(runner).await?;
    log_status_summary(cfg, &project, &status);
    Ok(status)
}

/// Stop the stack; unlike the pre-start stop, failure is an error here.
pub async fn down<R>(runner: &R, cfg: &RunConfig) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    cfg.validate()?;
    let compose_file = require_compose_file(&cfg.repo_path)?;
    ComposeProject::new(cfg, &compose_file)?.stop(runner).await
}
