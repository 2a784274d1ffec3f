//! Filesystem rule library: reads codified rules and writes accepted
//! artifacts under the project root.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Proposal, ProposalType};
use crate::domain::ports::{ArtifactWriter, ExistingRule, RuleIndex};
use crate::services::proposal_generator::{artifact_path, slugify};

#[derive(Debug, Clone)]
pub struct FsRuleLibrary {
    rules_dir: PathBuf,
}

impl FsRuleLibrary {
    /// `rules_dir` is absolute, or relative to the process working directory.
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
        }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Markdown rule files, sorted by path.
    async fn rule_files(&self) -> DomainResult<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.rules_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// SHA-256 over the names and contents of all rule files, recorded
    /// with a delivery so later analysis knows which rules were in force.
    pub async fn snapshot_hash(&self) -> DomainResult<String> {
        let mut hasher = Sha256::new();
        for path in self.rule_files().await? {
            let content = tokio::fs::read(&path).await?;
            if let Some(name) = path.file_name() {
                hasher.update(name.to_string_lossy().as_bytes());
            }
            hasher.update([0u8]);
            hasher.update(&content);
            hasher.update([0u8]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Project graph artifacts are JSON; a reviewer's edit is kept verbatim when
/// it already parses.
fn render_artifact(proposal: &Proposal, content: &str) -> DomainResult<String> {
    if proposal.proposal_type != ProposalType::ProjectGraph {
        return Ok(content.to_string());
    }
    if serde_json::from_str::<serde_json::Value>(content).is_ok() {
        return Ok(content.to_string());
    }
    let doc = serde_json::json!({
        "title": proposal.title,
        "description": proposal.description,
        "notes": content,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[async_trait]
impl ArtifactWriter for FsRuleLibrary {
    async fn create_artifact(
        &self,
        proposal: &Proposal,
        project_root: &Path,
        edited_content: Option<&str>,
    ) -> DomainResult<Option<PathBuf>> {
        let relative = match &proposal.proposed_path {
            Some(path) => PathBuf::from(path),
            None => artifact_path(&self.rules_dir, proposal.proposal_type, &slugify(&proposal.description)),
        };
        let target = project_root.join(relative);

        let content = edited_content.unwrap_or_else(|| proposal.effective_content());
        let rendered = render_artifact(proposal, content)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, rendered).await?;
        info!(
            proposal = %proposal.id,
            path = %target.display(),
            proposal_type = proposal.proposal_type.as_str(),
            "artifact written"
        );
        Ok(Some(target))
    }
}

#[async_trait]
impl RuleIndex for FsRuleLibrary {
    async fn existing_rules(&self) -> DomainResult<Vec<ExistingRule>> {
        let mut rules = Vec::new();
        for path in self.rule_files().await? {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => rules.push(ExistingRule {
                    path: path.display().to_string(),
                    content,
                }),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable rule"),
            }
        }
        Ok(rules)
    }
}
