//! Port trait definitions (Hexagonal Architecture)
//!
//! Collaborator contracts the orchestration core consumes:
//! - StateStore: durable per-session workflow state
//! - FailureLog: failure event recording and counting
//! - ArtifactWriter / RuleIndex: materializing proposals, checking existing rules
//! - WorktreeManager: git worktree isolation
//! - LearningRepository: candidates, proposals and baselines

pub mod artifact_writer;
pub mod failure_log;
pub mod learning_repository;
pub mod state_store;
pub mod worktree_manager;

pub use artifact_writer::{ArtifactWriter, ExistingRule, RuleIndex};
pub use failure_log::{failure_dedup_key, FailureLog, FailureQuery};
pub use learning_repository::{DecisionCounts, LearningRepository};
pub use state_store::StateStore;
pub use worktree_manager::{WorktreeCleanup, WorktreeManager, WorktreeSync};
