//! Git worktree manager port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::WorktreeInfo;

/// Outcome of merging a worktree branch back into its base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeSync {
    pub merged: bool,
    pub commit: Option<String>,
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeCleanup {
    pub removed: bool,
    pub branch_deleted: bool,
}

#[async_trait]
pub trait WorktreeManager: Send + Sync {
    async fn create(
        &self,
        slug: &str,
        repo_root: &Path,
        plan_path: Option<&str>,
        base_branch: &str,
    ) -> DomainResult<WorktreeInfo>;

    async fn sync(&self, worktree: &WorktreeInfo, repo_root: &Path) -> DomainResult<WorktreeSync>;

    async fn cleanup(&self, worktree: &WorktreeInfo, repo_root: &Path)
        -> DomainResult<WorktreeCleanup>;
}
