//! Git worktree manager backed by the `git` CLI.
//!
//! # Naming
//!
//! - Branch: `spec/<slug>`
//! - Worktree path: `<repo_root>/.waypoint/worktrees/<slug>`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::WorktreeInfo;
use crate::domain::ports::{WorktreeCleanup, WorktreeManager, WorktreeSync};

const WORKTREE_DIR: &str = ".waypoint/worktrees";

#[derive(Debug, Clone, Default)]
pub struct GitWorktreeManager;

impl GitWorktreeManager {
    pub fn new() -> Self {
        Self
    }

    pub fn branch_name(slug: &str) -> String {
        format!("spec/{slug}")
    }

    pub fn worktree_path(repo_root: &Path, slug: &str) -> PathBuf {
        repo_root.join(WORKTREE_DIR).join(slug)
    }
}

async fn git(dir: &Path, args: &[&str]) -> DomainResult<Output> {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DomainError::ExternalCommand(format!("failed to run git {}: {}", args.join(" "), e)))
}

/// Run git and return trimmed stdout, failing on a non-zero exit.
async fn git_checked(dir: &Path, args: &[&str]) -> DomainResult<String> {
    let output = git(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DomainError::ExternalCommand(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn branch_exists(repo_root: &Path, branch: &str) -> bool {
    let reference = format!("refs/heads/{branch}");
    git(repo_root, &["show-ref", "--verify", "--quiet", &reference])
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Parse `git diff --shortstat` output into (files, insertions, deletions).
pub fn parse_shortstat(line: &str) -> (u32, u32, u32) {
    let mut stats = (0, 0, 0);
    for part in line.split(',') {
        let mut words = part.split_whitespace();
        let Some(n) = words.next().and_then(|w| w.parse::<u32>().ok()) else {
            continue;
        };
        match words.next() {
            Some(w) if w.starts_with("file") => stats.0 = n,
            Some(w) if w.starts_with("insertion") => stats.1 = n,
            Some(w) if w.starts_with("deletion") => stats.2 = n,
            _ => {}
        }
    }
    stats
}

#[async_trait]
impl WorktreeManager for GitWorktreeManager {
    #[instrument(skip(self, repo_root), fields(repo_root = %repo_root.display()))]
    async fn create(
        &self,
        slug: &str,
        repo_root: &Path,
        plan_path: Option<&str>,
        base_branch: &str,
    ) -> DomainResult<WorktreeInfo> {
        let branch = Self::branch_name(slug);
        let path = Self::worktree_path(repo_root, slug);
        let path_str = path.display().to_string();

        if !branch_exists(repo_root, base_branch).await {
            return Err(DomainError::ExternalCommand(format!(
                "base branch '{base_branch}' does not exist"
            )));
        }

        if path.join(".git").is_file() {
            debug!(path = %path_str, "worktree already present");
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if branch_exists(repo_root, &branch).await {
                info!(branch = %branch, "creating worktree from existing branch");
                git_checked(repo_root, &["worktree", "add", &path_str, &branch]).await?;
            } else {
                info!(branch = %branch, base = %base_branch, "creating worktree on new branch");
                git_checked(repo_root, &["worktree", "add", "-b", &branch, &path_str, base_branch])
                    .await?;
            }
        }

        // An uncommitted plan would otherwise be missing from the worktree.
        if let Some(plan) = plan_path {
            let source = repo_root.join(plan);
            let target = path.join(plan);
            if source.is_file() && !target.exists() {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&source, &target).await?;
                debug!(plan, "copied plan into worktree");
            }
        }

        Ok(WorktreeInfo {
            path: path_str,
            branch,
            base_branch: base_branch.to_string(),
        })
    }

    /// Merge the worktree branch into its base, which must be checked out
    /// in `repo_root`.
    #[instrument(skip(self, repo_root), fields(branch = %worktree.branch))]
    async fn sync(&self, worktree: &WorktreeInfo, repo_root: &Path) -> DomainResult<WorktreeSync> {
        let head = git_checked(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if head != worktree.base_branch {
            return Err(DomainError::ExternalCommand(format!(
                "repository is on '{}', expected base branch '{}'",
                head, worktree.base_branch
            )));
        }

        let range = format!("{}...{}", worktree.base_branch, worktree.branch);
        let shortstat = git_checked(repo_root, &["diff", "--shortstat", &range]).await?;
        let (files_changed, insertions, deletions) = parse_shortstat(&shortstat);
        if files_changed == 0 {
            return Ok(WorktreeSync::default());
        }

        let message = format!("Merge {} into {}", worktree.branch, worktree.base_branch);
        git_checked(repo_root, &["merge", "--no-ff", "-m", &message, &worktree.branch]).await?;
        let commit = git_checked(repo_root, &["rev-parse", "HEAD"]).await?;
        info!(commit = %commit, files_changed, "worktree merged");

        Ok(WorktreeSync {
            merged: true,
            commit: Some(commit),
            files_changed,
            insertions,
            deletions,
        })
    }

    #[instrument(skip(self, repo_root), fields(path = %worktree.path))]
    async fn cleanup(&self, worktree: &WorktreeInfo, repo_root: &Path) -> DomainResult<WorktreeCleanup> {
        let mut removed = !Path::new(&worktree.path).exists();
        if !removed {
            let output = git(repo_root, &["worktree", "remove", &worktree.path]).await?;
            removed = output.status.success();
            if !removed {
                warn!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "failed to remove worktree, retrying with --force"
                );
                let forced = git(repo_root, &["worktree", "remove", "--force", &worktree.path]).await?;
                removed = forced.status.success();
            }
        }

        let mut branch_deleted = false;
        if removed && branch_exists(repo_root, &worktree.branch).await {
            let output = git(repo_root, &["branch", "-d", &worktree.branch]).await?;
            branch_deleted = output.status.success();
            if !branch_deleted {
                warn!(branch = %worktree.branch, "branch not deleted (may not be merged yet)");
            }
        }

        Ok(WorktreeCleanup {
            removed,
            branch_deleted,
        })
    }
}
