//! supabase-local - run a self-hosted Supabase stack on this machine
//!
//! ## Commands
//!
//! - `install` (default): clone the deployment, write `.env`, restart the stack
//! - `status`: show per-service state of the stack
//! - `down`: stop and remove the stack's containers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use supabase_local::config::{
    DEFAULT_BRANCH, DEFAULT_ENV_FILE, DEFAULT_PROJECT_NAME, DEFAULT_REPO_PATH, DEFAULT_REPO_URL,
    DEFAULT_SETTLE_SECS,
};
use supabase_local::{init_tracing, parse_env_pair, RunConfig, SystemRunner};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "supabase-local")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Install and run Supabase locally using Docker", long_about = None)]
struct Cli {
    /// Path to environment file
    #[arg(long, env = "SUPABASE_LOCAL_ENV_FILE", default_value = DEFAULT_ENV_FILE, global = true)]
    env_file: PathBuf,

    /// Docker Compose project name
    #[arg(long, env = "SUPABASE_LOCAL_PROJECT", default_value = DEFAULT_PROJECT_NAME, global = true)]
    project_name: String,

    /// Path to clone the Supabase repository into
    #[arg(long, env = "SUPABASE_LOCAL_REPO_PATH", default_value = DEFAULT_REPO_PATH, global = true)]
    repo_path: PathBuf,

    /// Repository to clone
    #[arg(long, env = "SUPABASE_LOCAL_REPO_URL", default_value = DEFAULT_REPO_URL, global = true)]
    repo_url: String,

    /// Branch to checkout
    #[arg(long, env = "SUPABASE_LOCAL_BRANCH", default_value = DEFAULT_BRANCH, global = true)]
    branch: String,

    /// Run Docker Compose in the foreground instead of detached
    #[arg(long, global = true)]
    no_detach: bool,

    /// Seconds to wait after startup before checking service status
    #[arg(long, env = "SUPABASE_LOCAL_SETTLE_SECS", default_value_t = DEFAULT_SETTLE_SECS, global = true)]
    settle_secs: u64,

    /// Fetch and fast-forward an already cloned repository
    #[arg(long, global = true)]
    update: bool,

    /// Extra KEY=VALUE written into a newly created env file (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_set, global = true)]
    set: Vec<(String, String)>,

    /// git executable
    #[arg(long, env = "SUPABASE_LOCAL_GIT", default_value = "git", global = true)]
    git_bin: String,

    /// docker executable
    #[arg(long, env = "SUPABASE_LOCAL_DOCKER", default_value = "docker", global = true)]
    docker_bin: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Clone, configure and start the stack (default)
    Install,

    /// Show the state of each service in the stack
    Status,

    /// Stop and remove the stack's containers
    Down,
}

fn parse_set(raw: &str) -> std::result::Result<(String, String), String> {
    parse_env_pair(raw).map_err(|e| e.to_string())
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            repo_path: self.repo_path.clone(),
            repo_url: self.repo_url.clone(),
            env_file: self.env_file.clone(),
            project_name: self.project_name.clone(),
            branch: self.branch.clone(),
            detach: !self.no_detach,
            verbose: self.verbose,
            settle: Duration::from_secs(self.settle_secs),
            update_existing: self.update,
            env_overrides: self.set.clone(),
            git_bin: self.git_bin.clone(),
            docker_bin: self.docker_bin.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = cli.run_config();
    init_tracing(&cfg, cli.json);

    let runner = SystemRunner::new(cfg.verbose);

    match cli.command.unwrap_or(Commands::Install) {
        Commands::Install => cmd_install(&runner, &cfg).await,
        Commands::Status => cmd_status(&runner, &cfg).await,
        Commands::Down => cmd_down(&runner, &cfg).await,
    }
}

async fn cmd_install(runner: &SystemRunner, cfg: &RunConfig) -> Result<()> {
    let report = supabase_local::install(runner, cfg)
        .await
        .context("Supabase installation failed")?;

    info!(
        repository = ?report.repository,
        env_file = ?report.env_file,
        stop = ?report.stop,
        "Installation finished"
    );
    Ok(())
}

async fn cmd_status(runner: &SystemRunner, cfg: &RunConfig) -> Result<()> {
    let status = supabase_local::status(runner, cfg)
        .await
        .context(format!("Failed to check status of project '{}'", cfg.project_name))?;

    if !status.all_running() {
        anyhow::bail!(
            "{} of {} services running",
            status.running_count(),
            status.services.len()
        );
    }
    Ok(())
}

async fn cmd_down(runner: &SystemRunner, cfg: &RunConfig) -> Result<()> {
    supabase_local::down(runner, cfg)
        .await
        .context(format!("Failed to stop project '{}'", cfg.project_name))
}
