//! Spec workflow coordinator.
//!
//! Drives one session's spec workflow through its phase table. Every
//! operation is a read/modify/write against the [`StateStore`]; coordinators
//! hold no state of their own, so a fresh instance per request is fine.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    PlanStatus, ReviewAggregate, ReviewVerdict, SessionId, SpecConfig, SpecPhase, SpecState,
    WorkflowKind, WorkflowState,
};
use crate::domain::ports::{FailureLog, StateStore, WorktreeCleanup, WorktreeManager, WorktreeSync};
use crate::services::best_effort::best_effort;
use crate::services::verdict_aggregator::aggregate_verdicts;

const WORKFLOW: &str = "spec";

/// Failure-log category for failing reviewers.
pub const REVIEW_FAILURE_CATEGORY: &str = "review";

pub struct SpecCoordinator {
    store: Arc<dyn StateStore>,
    session: SessionId,
    config: SpecConfig,
    failure_log: Option<Arc<dyn FailureLog>>,
    worktrees: Option<Arc<dyn WorktreeManager>>,
}

impl SpecCoordinator {
    pub fn new(store: Arc<dyn StateStore>, session: SessionId, config: SpecConfig) -> Self {
        Self {
            store,
            session,
            config,
            failure_log: None,
            worktrees: None,
        }
    }

    /// Report failing reviewers to a failure log.
    pub fn with_failure_log(mut self, failure_log: Arc<dyn FailureLog>) -> Self {
        self.failure_log = Some(failure_log);
        self
    }

    pub fn with_worktree_manager(mut self, worktrees: Arc<dyn WorktreeManager>) -> Self {
        self.worktrees = Some(worktrees);
        self
    }

    /// Current state, or `NoActiveWorkflow`.
    pub async fn state(&self) -> DomainResult<SpecState> {
        self.store
            .read(&self.session, WorkflowKind::Spec)
            .await
            .and_then(WorkflowState::into_spec)
            .ok_or_else(|| DomainError::NoActiveWorkflow(WORKFLOW.to_string()))
    }

    async fn save(&self, mut state: SpecState) -> DomainResult<SpecState> {
        state.touch();
        self.store
            .write(&self.session, &WorkflowState::Spec(state.clone()))
            .await?;
        Ok(state)
    }

    /// Begin a new workflow. Refused while a previous one is unfinished.
    pub async fn start(&self, slug: &str, plan_path: Option<String>) -> DomainResult<SpecState> {
        if let Some(existing) = self
            .store
            .read(&self.session, WorkflowKind::Spec)
            .await
            .and_then(WorkflowState::into_spec)
        {
            if !existing.is_terminal() {
                return Err(DomainError::AlreadyActive {
                    workflow: WORKFLOW.to_string(),
                    slug: existing.slug,
                    phase: existing.phase.to_string(),
                });
            }
        }

        let state = SpecState::new(
            slug,
            plan_path,
            self.config.variant,
            self.config.max_review_iterations,
        );
        info!(
            session = %self.session,
            slug,
            variant = state.variant.as_str(),
            phase = %state.phase,
            "spec workflow started"
        );
        self.save(state).await
    }

    /// Move to `target` if the state's table allows it.
    ///
    /// Moving from a review phase back to `implement` is a fix loop and goes
    /// through [`Self::start_fix_loop`].
    pub async fn transition(&self, target: SpecPhase) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        if target == SpecPhase::Implement
            && matches!(state.phase, SpecPhase::Verify | SpecPhase::Governance)
        {
            return self.start_fix_loop().await;
        }

        let from = state.phase;
        apply_transition(&mut state, target)?;
        match target {
            SpecPhase::Implement if from == SpecPhase::Plan => {
                state.plan_status = PlanStatus::Approved;
            }
            SpecPhase::Verify => state.plan_status = PlanStatus::Verifying,
            _ => {}
        }
        self.save(state).await
    }

    pub async fn approve_plan(&self, total_tasks: u32) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        require_phase(&state, SpecPhase::Plan, SpecPhase::Implement)?;
        apply_transition(&mut state, SpecPhase::Implement)?;
        state.plan_status = PlanStatus::Approved;
        state.total_tasks = total_tasks;
        state.completed_tasks = 0;
        state.current_task = 1;
        self.save(state).await
    }

    /// Point `current_task` at task `n`. Bookkeeping only.
    pub async fn start_task(&self, n: u32) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        state.current_task = n.clamp(1, state.total_tasks.max(1));
        self.save(state).await
    }

    /// Count task `n` as done. Neither counter ever exceeds `total_tasks`.
    pub async fn complete_task(&self, n: u32) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        state.completed_tasks = state.completed_tasks.saturating_add(1).min(state.total_tasks);
        state.current_task = state
            .current_task
            .max(n)
            .saturating_add(1)
            .min(state.total_tasks);
        info!(
            slug = %state.slug,
            completed = state.completed_tasks,
            total = state.total_tasks,
            "task completed"
        );
        self.save(state).await
    }

    pub async fn all_tasks_done(&self) -> DomainResult<bool> {
        Ok(self.state().await?.all_tasks_done())
    }

    pub async fn start_verify(&self) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        apply_transition(&mut state, SpecPhase::Verify)?;
        state.plan_status = PlanStatus::Verifying;
        self.save(state).await
    }

    /// Aggregate a review round and keep the aggregate for `needs_fix_loop`.
    /// Each failing reviewer is reported to the failure log, best effort.
    pub async fn record_verdicts(&self, verdicts: &[ReviewVerdict]) -> DomainResult<ReviewAggregate> {
        let mut state = self.state().await?;
        let aggregate = aggregate_verdicts(verdicts);

        if let Some(failure_log) = &self.failure_log {
            for verdict in verdicts.iter().filter(|v| !v.passed()) {
                let detail = format!(
                    "{} failed review of {} (iteration {})",
                    verdict.reviewer, state.slug, state.review_iteration
                );
                best_effort(
                    "report review failure",
                    failure_log.record_failure(REVIEW_FAILURE_CATEGORY, None, &detail),
                )
                .await;
            }
        }

        info!(
            slug = %state.slug,
            all_passed = aggregate.all_passed,
            failed = aggregate.failed_reviewers.len(),
            must_fix = aggregate.must_fix_count,
            "review verdicts recorded"
        );
        state.last_review = Some(aggregate.clone());
        self.save(state).await?;
        Ok(aggregate)
    }

    /// True when the last review had a failing reviewer and the loop bound
    /// still allows another pass.
    pub async fn needs_fix_loop(&self) -> DomainResult<bool> {
        let state = self.state().await?;
        let failed = state
            .last_review
            .as_ref()
            .is_some_and(ReviewAggregate::has_failures);
        Ok(failed && state.review_iteration < state.max_review_iterations)
    }

    /// Return from review to `implement` and count the iteration.
    pub async fn start_fix_loop(&self) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        if !matches!(state.phase, SpecPhase::Verify | SpecPhase::Governance) {
            return Err(invalid_transition(&state, SpecPhase::Implement));
        }
        if self.config.enforce_fix_loop_bound
            && state.review_iteration >= state.max_review_iterations
        {
            return Err(DomainError::MaxIterationsExceeded {
                iteration: state.review_iteration,
                max: state.max_review_iterations,
            });
        }

        apply_transition(&mut state, SpecPhase::Implement)?;
        state.review_iteration += 1;
        state.plan_status = PlanStatus::Implementing;
        info!(
            slug = %state.slug,
            iteration = state.review_iteration,
            max = state.max_review_iterations,
            "spec fix loop started"
        );
        self.save(state).await
    }

    pub async fn start_learn(&self) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        apply_transition(&mut state, SpecPhase::Learn)?;
        self.save(state).await
    }

    /// Mark the plan complete. Only valid once in `learn`.
    pub async fn complete_spec(&self) -> DomainResult<SpecState> {
        let mut state = self.state().await?;
        if state.phase != SpecPhase::Learn {
            return Err(invalid_transition(&state, SpecPhase::Learn));
        }
        state.plan_status = PlanStatus::Complete;
        info!(slug = %state.slug, "spec workflow complete");
        self.save(state).await
    }

    fn worktree_manager(&self) -> DomainResult<&Arc<dyn WorktreeManager>> {
        self.worktrees
            .as_ref()
            .ok_or_else(|| DomainError::ValidationFailed("no worktree manager configured".to_string()))
    }

    /// Create an isolated worktree for the workflow and record it.
    pub async fn attach_worktree(&self, repo_root: &Path, base_branch: &str) -> DomainResult<SpecState> {
        let manager = self.worktree_manager()?;
        let mut state = self.state().await?;
        if let Some(existing) = &state.worktree {
            return Err(DomainError::ValidationFailed(format!(
                "worktree already attached at {}",
                existing.path
            )));
        }

        let worktree = manager
            .create(&state.slug, repo_root, state.plan_path.as_deref(), base_branch)
            .await?;
        info!(slug = %state.slug, path = %worktree.path, branch = %worktree.branch, "worktree attached");
        state.worktree = Some(worktree);
        self.save(state).await
    }

    /// Merge the workflow's worktree branch back into its base.
    pub async fn sync_worktree(&self, repo_root: &Path) -> DomainResult<WorktreeSync> {
        let manager = self.worktree_manager()?;
        let state = self.state().await?;
        let worktree = state
            .worktree
            .as_ref()
            .ok_or_else(|| DomainError::ValidationFailed("no worktree attached".to_string()))?;
        manager.sync(worktree, repo_root).await
    }

    /// Remove the worktree and forget it.
    pub async fn cleanup_worktree(&self, repo_root: &Path) -> DomainResult<WorktreeCleanup> {
        let manager = self.worktree_manager()?;
        let mut state = self.state().await?;
        let Some(worktree) = state.worktree.take() else {
            return Err(DomainError::ValidationFailed("no worktree attached".to_string()));
        };
        let cleanup = manager.cleanup(&worktree, repo_root).await?;
        if !cleanup.removed {
            state.worktree = Some(worktree);
        }
        self.save(state).await?;
        Ok(cleanup)
    }
}

fn invalid_transition(state: &SpecState, target: SpecPhase) -> DomainError {
    DomainError::InvalidTransition {
        workflow: WORKFLOW.to_string(),
        from: state.phase.to_string(),
        to: target.to_string(),
        legal: state
            .variant
            .successors(state.phase)
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

fn require_phase(state: &SpecState, phase: SpecPhase, target: SpecPhase) -> DomainResult<()> {
    if state.phase == phase {
        Ok(())
    } else {
        Err(invalid_transition(state, target))
    }
}

fn apply_transition(state: &mut SpecState, target: SpecPhase) -> DomainResult<()> {
    if !state.variant.can_transition(state.phase, target) {
        return Err(invalid_transition(state, target));
    }
    info!(slug = %state.slug, from = %state.phase, to = %target, "spec phase transition");
    state.phase = target;
    Ok(())
}
