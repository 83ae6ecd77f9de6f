//! Deployment repository acquisition
//!
//! Clones only the `docker/` tree of the upstream repository (blobless,
//! depth 1, cone-mode sparse checkout) and locates the compose manifest in it.

use crate::config::{RunConfig, DEPLOYMENT_DIR};
use crate::error::BootstrapError;
use crate::runner::{path_arg, Check, CommandRunner, Invocation};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest locations tried before falling back to a directory walk
const COMPOSE_CANDIDATES: &[&str] = &[
    "docker/docker-compose.yml",
    "docker/compose/docker-compose.yml",
    "docker-compose.yml",
];

const COMPOSE_FILE_SUFFIX: &str = "docker-compose.yml";

/// What acquisition did with the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoOutcome {
    Reused,
    Updated,
    Cloned,
}

/// Make sure `<repo>/docker` is present, cloning it if needed.
pub async fn ensure_repository<R>(runner: &R, cfg: &RunConfig) -> Result<RepoOutcome>
where
    R: CommandRunner + ?Sized,
{
    let deployment = cfg.deployment_dir();
    if deployment.is_dir() {
        info!(
            "Repository already present at {}, reusing it",
            cfg.repo_path.display()
        );
        if cfg.update_existing {
            return Ok(update_repository(runner, cfg).await);
        }
        return Ok(RepoOutcome::Reused);
    }

    let created_here = !cfg.repo_path.exists();
    info!("Cloning {} ({}) into {}", cfg.repo_url, cfg.branch, cfg.repo_path.display());

    if let Err(e) = clone_repository(runner, cfg).await {
        if created_here && cfg.repo_path.exists() {
            warn!("Removing partial clone at {}", cfg.repo_path.display());
            if let Err(cleanup) = tokio::fs::remove_dir_all(&cfg.repo_path).await {
                warn!(
                    "Could not remove {}: {}",
                    cfg.repo_path.display(),
                    cleanup
                );
            }
        }
        return Err(e);
    }

    info!("Repository cloned successfully to {}", cfg.repo_path.display());
    Ok(RepoOutcome::Cloned)
}

/// The git invocations performing a fresh sparse clone, in order.
pub fn clone_commands(cfg: &RunConfig) -> Result<Vec<Invocation>> {
    let repo = path_arg(&cfg.repo_path)?;
    Ok(vec![
        Invocation::new(
            &cfg.git_bin,
            [
                "clone",
                "--filter=blob:none",
                "--no-checkout",
                "--depth",
                "1",
                "--branch",
                cfg.branch.as_str(),
                cfg.repo_url.as_str(),
                repo.as_str(),
            ],
        ),
        Invocation::new(&cfg.git_bin, ["sparse-checkout", "set", "--cone", DEPLOYMENT_DIR])
            .in_dir(&cfg.repo_path),
        Invocation::new(&cfg.git_bin, ["checkout", cfg.branch.as_str()]).in_dir(&cfg.repo_path),
    ])
}

/// The git invocations refreshing an existing checkout, in order.
pub fn update_commands(cfg: &RunConfig) -> Vec<Invocation> {
    let branch = cfg.branch.as_str();
    [
        vec!["fetch", "origin", branch],
        vec!["checkout", branch],
        vec!["pull", "--ff-only", "origin", branch],
        vec!["sparse-checkout", "set", "--cone", DEPLOYMENT_DIR],
    ]
    .into_iter()
    .map(|args| Invocation::new(&cfg.git_bin, args).in_dir(&cfg.repo_path))
    .collect()
}

async fn clone_repository<R>(runner: &R, cfg: &RunConfig) -> Result<()>
where
    R: CommandRunner + ?Sized,
{
    for invocation in clone_commands(cfg)? {
        runner.run(&invocation, Check::Fatal).await?;
    }
    Ok(())
}

async fn update_repository<R>(runner: &R, cfg: &RunConfig) -> RepoOutcome
where
    R: CommandRunner + ?Sized,
{
    for invocation in update_commands(cfg) {
        if let Err(e) = runner.run(&invocation, Check::Fatal).await {
            warn!("Could not update repository, using existing copy: {}", e);
            return RepoOutcome::Reused;
        }
    }
    info!("Repository {} updated", cfg.repo_path.display());
    RepoOutcome::Updated
}

/// Find the compose manifest under `repo`.
pub fn locate_compose_file(repo: &Path) -> Option<PathBuf> {
    if let Some(found) = COMPOSE_CANDIDATES
        .iter()
        .map(|candidate| repo.join(candidate))
        .find(|path| path.is_file())
    {
        debug!("Found compose file at {}", found.display());
        return Some(found);
    }

    let found = find_compose_recursive(repo);
    match &found {
        Some(path) => debug!("Found compose file at {}", path.display()),
        None => debug!("No compose file under {}", repo.display()),
    }
    found
}

/// Like [`locate_compose_file`] but missing is an error.
pub fn require_compose_file(repo: &Path) -> Result<PathBuf> {
    locate_compose_file(repo).ok_or_else(|| BootstrapError::ComposeFileNotFound(repo.to_path_buf()))
}

fn find_compose_recursive(dir: &Path) -> Option<PathBuf> {
    // file_type() does not follow symlinks, so linked directories are never
    // descended into and link cycles cannot recurse.
    let mut entries: Vec<(PathBuf, std::fs::FileType)> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_type().ok().map(|t| (e.path(), t)))
        .collect();

    // Sort for deterministic ordering
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in &entries {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if file_type.is_file() && name.ends_with(COMPOSE_FILE_SUFFIX) {
            return Some(path.clone());
        }
    }

    entries
        .iter()
        .filter(|(_, file_type)| file_type.is_dir())
        .filter(|(path, _)| path.file_name().map(|n| n != ".git").unwrap_or(false))
        .find_map(|(path, _)| find_compose_recursive(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{RecordingRunner, Reply};
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "services: {}\n").unwrap();
    }

    #[test]
    fn test_clone_commands_are_sparse_and_shallow() {
        let cfg = RunConfig::default()
            .with_repo_path("/tmp/sb")
            .with_branch("develop");
        let cmds = clone_commands(&cfg).unwrap();

        assert_eq!(cmds.len(), 3);
        assert_eq!(
            cmds[0].to_string(),
            "git clone --filter=blob:none --no-checkout --depth 1 --branch develop \
             https://github.com/supabase/supabase.git /tmp/sb"
        );
        assert!(cmds[0].cwd.is_none());
        assert_eq!(cmds[1].to_string(), "git sparse-checkout set --cone docker");
        assert_eq!(cmds[1].cwd.as_deref(), Some(Path::new("/tmp/sb")));
        assert_eq!(cmds[2].to_string(), "git checkout develop");
    }

    #[tokio::test]
    async fn test_existing_deployment_dir_skips_clone() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path());
        std::fs::create_dir_all(cfg.deployment_dir()).unwrap();

        let runner = RecordingRunner::new();
        let outcome = ensure_repository(&runner, &cfg).await.unwrap();

        assert_eq!(outcome, RepoOutcome::Reused);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_existing_runs_refresh() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path()).with_update_existing(true);
        std::fs::create_dir_all(cfg.deployment_dir()).unwrap();

        let runner = RecordingRunner::new();
        let outcome = ensure_repository(&runner, &cfg).await.unwrap();

        assert_eq!(outcome, RepoOutcome::Updated);
        assert_eq!(runner.count(&["clone"]), 0);
        assert_eq!(
            runner.command_lines(),
            vec![
                "git fetch origin master",
                "git checkout master",
                "git pull --ff-only origin master",
                "git sparse-checkout set --cone docker",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_update_keeps_existing_copy() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path()).with_update_existing(true);
        std::fs::create_dir_all(cfg.deployment_dir()).unwrap();

        let runner = RecordingRunner::new()
            .reply_when(|inv| inv.starts_with(&["fetch"]), Reply::fail(128, "offline"));
        let outcome = ensure_repository(&runner, &cfg).await.unwrap();

        assert_eq!(outcome, RepoOutcome::Reused);
        assert_eq!(runner.calls().len(), 1);
        assert!(cfg.deployment_dir().is_dir());
    }

    #[tokio::test]
    async fn test_clone_runs_all_steps() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path());

        let runner = RecordingRunner::new();
        let outcome = ensure_repository(&runner, &cfg).await.unwrap();

        assert_eq!(outcome, RepoOutcome::Cloned);
        assert_eq!(runner.calls(), clone_commands(&cfg).unwrap());
    }

    #[tokio::test]
    async fn test_failed_clone_removes_partial_directory() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path());
        let repo = cfg.repo_path.clone();

        // clone creates the directory, then checkout fails
        let runner = RecordingRunner::new()
            .on_call(
                |inv| inv.starts_with(&["clone"]),
                move |_| std::fs::create_dir_all(repo.join(".git")).unwrap(),
            )
            .reply_when(
                |inv| inv.starts_with(&["checkout"]),
                Reply::fail(1, "error: pathspec 'master' did not match"),
            );

        let err = ensure_repository(&runner, &cfg).await.unwrap_err();
        assert!(matches!(err, BootstrapError::CommandFailed { code: 1, .. }));
        assert!(!cfg.repo_path.exists());
    }

    #[tokio::test]
    async fn test_failed_clone_keeps_preexisting_directory() {
        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path());
        std::fs::create_dir_all(&cfg.repo_path).unwrap();
        std::fs::write(cfg.repo_path.join("notes.txt"), "mine").unwrap();

        let runner = RecordingRunner::new().reply_when(
            |inv| inv.starts_with(&["clone"]),
            Reply::fail(128, "destination path already exists and is not empty"),
        );

        assert!(ensure_repository(&runner, &cfg).await.is_err());
        assert!(cfg.repo_path.join("notes.txt").exists());
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_locate_prefers_docker_dir() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("docker-compose.yml"));
        touch(&dir.path().join("docker/docker-compose.yml"));

        assert_eq!(
            locate_compose_file(dir.path()).unwrap(),
            dir.path().join("docker/docker-compose.yml")
        );
    }

    #[test]
    fn test_locate_walks_tree() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join(".git/dev.docker-compose.yml"));
        touch(&dir.path().join("docker/stacks/dev.docker-compose.yml"));

        assert_eq!(
            locate_compose_file(dir.path()).unwrap(),
            dir.path().join("docker/stacks/dev.docker-compose.yml")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_ignores_symlinked_directories() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        touch(&outside.path().join("elsewhere.docker-compose.yml"));
        std::fs::create_dir_all(dir.path().join("docker/nested")).unwrap();
        // a cycle back to the repo root and a link out of the tree
        std::os::unix::fs::symlink(dir.path(), dir.path().join("docker/nested/loop")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("docker/out")).unwrap();

        assert!(locate_compose_file(dir.path()).is_none());

        touch(&dir.path().join("docker/nested/dev.docker-compose.yml"));
        assert_eq!(
            locate_compose_file(dir.path()).unwrap(),
            dir.path().join("docker/nested/dev.docker-compose.yml")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_repo_path_is_rejected_before_git() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let cfg = RunConfig::rooted_at(dir.path())
            .with_repo_path(dir.path().join(OsStr::from_bytes(b"supa\xffbase")));

        assert!(matches!(
            clone_commands(&cfg),
            Err(BootstrapError::NonUtf8Path(_))
        ));

        let runner = RecordingRunner::new();
        let err = ensure_repository(&runner, &cfg).await.unwrap_err();
        assert!(matches!(err, BootstrapError::NonUtf8Path(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_require_compose_file_missing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docker")).unwrap();

        let err = require_compose_file(dir.path()).unwrap_err();
        assert!(matches!(err, BootstrapError::ComposeFileNotFound(_)));
    }
}
