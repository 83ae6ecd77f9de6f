//! supabase-local: bootstrap a self-hosted Supabase stack
//!
//! Clones the `docker/` deployment of the upstream repository, writes a
//! default `.env` when none exists, and drives `docker compose` to stop any
//! previous stack and bring a fresh one up.
//!
//! Every external command goes through the [`CommandRunner`] trait, so the
//! whole sequence can run against [`fakes::RecordingRunner`] in tests.

pub mod compose;
pub mod config;
pub mod env_file;
pub mod error;
pub mod fakes;
pub mod pipeline;
pub mod preflight;
pub mod repo;
pub mod runner;
pub mod telemetry;

pub use compose::{ComposeProject, ServiceState, StackStatus, StopOutcome};
pub use config::RunConfig;
pub use env_file::{parse_env_pair, provision_env_file, EnvOutcome, DEFAULT_ENV};
pub use error::BootstrapError;
pub use pipeline::{down, install, status, InstallReport};
pub use repo::{ensure_repository, locate_compose_file, RepoOutcome};
pub use runner::{Check, CommandResult, CommandRunner, Invocation, SystemRunner};
pub use telemetry::init_tracing;

/// Result type for supabase-local operations
pub type Result<T> = std::result::Result<T, BootstrapError>;
