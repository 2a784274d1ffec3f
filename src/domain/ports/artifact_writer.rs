//! Artifact materialization and rule lookup ports.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::errors::DomainResult;
use crate::domain::models::Proposal;

/// A rule already codified on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRule {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Write the artifact for an accepted proposal. Returns the written path,
    /// or `None` when the proposal type has nothing to write.
    async fn create_artifact(
        &self,
        proposal: &Proposal,
        project_root: &Path,
        edited_content: Option<&str>,
    ) -> DomainResult<Option<PathBuf>>;
}

#[async_trait]
pub trait RuleIndex: Send + Sync {
    /// All rules currently codified.
    async fn existing_rules(&self) -> DomainResult<Vec<ExistingRule>>;
}
