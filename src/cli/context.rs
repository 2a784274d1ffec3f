//! Wiring from loaded configuration to coordinators and services.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteFailureLog, SqliteLearningRepository};
use crate::adapters::{FileStateStore, FsRuleLibrary, GitWorktreeManager};
use crate::domain::models::{Config, SessionId};
use crate::services::{DeliveryCoordinator, LearningService, SpecCoordinator};

/// Per-invocation context. Relative config paths resolve against `project_root`.
pub struct AppContext {
    pub config: Config,
    pub session: SessionId,
    pub project_root: PathBuf,
}

impl AppContext {
    pub fn new(config: Config, session: impl Into<String>) -> Result<Self> {
        let project_root = std::env::current_dir().context("Failed to resolve the working directory")?;
        let session = SessionId::new(session);
        session.validate()?;
        Ok(Self {
            config,
            session,
            project_root,
        })
    }

    fn state_store(&self) -> Arc<FileStateStore> {
        Arc::new(FileStateStore::new(self.project_root.join(&self.config.state_dir)))
    }

    pub fn rule_library(&self) -> FsRuleLibrary {
        FsRuleLibrary::new(self.project_root.join(&self.config.learning.rules_dir))
    }

    pub async fn failure_log(&self) -> Result<Arc<SqliteFailureLog>> {
        let pool = self.database().await?;
        Ok(Arc::new(SqliteFailureLog::new(pool)))
    }

    async fn database(&self) -> Result<sqlx::SqlitePool> {
        let path = self.project_root.join(&self.config.database.path);
        initialize_database(&path.to_string_lossy(), self.config.database.max_connections)
            .await
            .context("Failed to initialize database")
    }

    /// Spec coordinator with the failure log and git worktrees wired in.
    pub async fn spec_coordinator(&self) -> Result<SpecCoordinator> {
        let failure_log = self.failure_log().await?;
        Ok(
            SpecCoordinator::new(self.state_store(), self.session.clone(), self.config.spec.clone())
                .with_failure_log(failure_log)
                .with_worktree_manager(Arc::new(GitWorktreeManager::new())),
        )
    }

    pub fn delivery_coordinator(&self) -> DeliveryCoordinator {
        DeliveryCoordinator::new(self.state_store(), self.session.clone(), self.config.delivery.clone())
    }

    pub async fn learning_service(&self) -> Result<LearningService> {
        let pool = self.database().await?;
        let rules = Arc::new(self.rule_library());
        Ok(LearningService::new(
            Arc::new(SqliteLearningRepository::new(pool.clone())),
            Arc::new(SqliteFailureLog::new(pool)),
            rules.clone(),
            rules,
            self.config.learning.clone(),
            self.project_root.clone(),
        ))
    }
}
