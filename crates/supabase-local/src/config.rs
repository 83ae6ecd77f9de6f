//! Run configuration
//!
//! A [`RunConfig`] is resolved once at startup (defaults overlaid with
//! command-line overrides) and passed by reference to every stage.

use crate::runner::path_arg;
use crate::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upstream repository holding the self-hosting deployment
pub const DEFAULT_REPO_URL: &str = "https://github.com/supabase/supabase.git";
/// Where the repository is cloned, relative to the working directory
pub const DEFAULT_REPO_PATH: &str = "supabase";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_PROJECT_NAME: &str = "supabase";
pub const DEFAULT_BRANCH: &str = "master";
/// Seconds to wait after `up -d` before querying service status
pub const DEFAULT_SETTLE_SECS: u64 = 10;
/// Subdirectory of the repository containing the compose manifest
pub const DEPLOYMENT_DIR: &str = "docker";

/// Resolved options for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub repo_path: PathBuf,
    pub repo_url: String,
    pub env_file: PathBuf,
    pub project_name: String,
    pub branch: String,
    /// Run containers in the background (`up -d`)
    pub detach: bool,
    pub verbose: bool,
    pub settle: Duration,
    /// Refresh an already-cloned repository instead of reusing it as-is
    pub update_existing: bool,
    /// Extra `KEY=VALUE` pairs written into a freshly created env file
    pub env_overrides: Vec<(String, String)>,
    pub git_bin: String,
    pub docker_bin: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            repo_path: PathBuf::from(DEFAULT_REPO_PATH),
            repo_url: DEFAULT_REPO_URL.to_string(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            detach: true,
            verbose: false,
            settle: Duration::from_secs(DEFAULT_SETTLE_SECS),
            update_existing: false,
            env_overrides: Vec::new(),
            git_bin: "git".to_string(),
            docker_bin: "docker".to_string(),
        }
    }
}

impl RunConfig {
    /// Defaults rooted at `dir` instead of the process working directory
    pub fn rooted_at(dir: &Path) -> Self {
        RunConfig {
            repo_path: dir.join(DEFAULT_REPO_PATH),
            env_file: dir.join(DEFAULT_ENV_FILE),
            ..Self::default()
        }
    }

    pub fn with_repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = path.into();
        self
    }

    pub fn with_repo_url(mut self, url: &str) -> Self {
        self.repo_url = url.to_string();
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    pub fn with_project_name(mut self, name: &str) -> Self {
        self.project_name = name.to_string();
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn with_detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }

    pub fn with_env_override(mut self, key: &str, value: &str) -> Self {
        self.env_overrides.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_git_bin(mut self, bin: &str) -> Self {
        self.git_bin = bin.to_string();
        self
    }

    pub fn with_docker_bin(mut self, bin: &str) -> Self {
        self.docker_bin = bin.to_string();
        self
    }

    /// Reject paths that git or docker would receive mangled.
    pub fn validate(&self) -> Result<()> {
        path_arg(&self.repo_path)?;
        path_arg(&self.env_file)?;
        Ok(())
    }

    /// `<repo>/docker`, whose presence marks an acquired repository
    pub fn deployment_dir(&self) -> PathBuf {
        self.repo_path.join(DEPLOYMENT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.repo_path, PathBuf::from("supabase"));
        assert_eq!(cfg.env_file, PathBuf::from(".env"));
        assert_eq!(cfg.project_name, "supabase");
        assert_eq!(cfg.branch, "master");
        assert!(cfg.detach);
        assert!(!cfg.verbose);
        assert!(!cfg.update_existing);
        assert_eq!(cfg.settle, Duration::from_secs(10));
        assert!(cfg.env_overrides.is_empty());
    }

    #[test]
    fn test_rooted_at_only_moves_paths() {
        let cfg = RunConfig::rooted_at(Path::new("/work"));
        assert_eq!(cfg.repo_path, PathBuf::from("/work/supabase"));
        assert_eq!(cfg.env_file, PathBuf::from("/work/.env"));
        assert_eq!(cfg.deployment_dir(), PathBuf::from("/work/supabase/docker"));
        assert_eq!(cfg.project_name, DEFAULT_PROJECT_NAME);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let cfg = RunConfig::default()
            .with_branch("develop")
            .with_project_name("sb-test")
            .with_detach(false)
            .with_env_override("POSTGRES_PASSWORD", "secret");
        assert_eq!(cfg.branch, "develop");
        assert_eq!(cfg.project_name, "sb-test");
        assert!(!cfg.detach);
        assert_eq!(
            cfg.env_overrides,
            vec![("POSTGRES_PASSWORD".to_string(), "secret".to_string())]
        );
    }
}
