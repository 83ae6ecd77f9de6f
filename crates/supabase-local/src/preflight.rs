//! Tool availability checks run before anything touches the filesystem.

use crate::config::RunConfig;
use crate::error::BootstrapError;
use crate::runner::{Check, CommandRunner, Invocation};
use crate::Result;
use tracing::{error, info};

/// Docker daemon reachable: `docker --version` and `docker info` succeed.
pub async fn verify_docker<R>(runner: &R, docker_bin: &str) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    for args in [&["--version"][..], &["info"][..]] {
        if runner
            .run(&Invocation::new(docker_bin, args.iter().copied()), Check::Fatal)
            .await
            .is_err()
        {
            error!("Docker is not installed or not running. Please install Docker and start it.");
            return Err(BootstrapError::ToolUnavailable(format!("{docker_bin} daemon")));
        }
    }
    info!("Docker is installed and running");
    Ok(())
}

/// Compose plugin present: `docker compose version` succeeds.
pub async fn verify_compose<R>(runner: &R, docker_bin: &str) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    match runner
        .run(&Invocation::new(docker_bin, ["compose", "version"]), Check::Fatal)
        .await
    {
        Ok(_) => {
            info!("Docker Compose is installed");
            Ok(())
        }
        Err(BootstrapError::Execution { .. }) => {
            error!("Docker Compose not found. Please install Docker Compose.");
            Err(BootstrapError::ToolUnavailable(format!("{docker_bin} compose")))
        }
        Err(_) => {
            error!("Docker Compose command failed. Please ensure Docker Compose is properly installed.");
            Err(BootstrapError::ToolUnavailable(format!("{docker_bin} compose")))
        }
    }
}

/// Both checks, docker first.
pub async fn verify_tools<R>(runner: &R, cfg: &RunConfig) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    verify_docker(runner, &cfg.docker_bin).await?;
    verify_compose(runner, &cfg.docker_bin).await
}
