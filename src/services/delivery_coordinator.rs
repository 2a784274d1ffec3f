//! Delivery workflow coordinator.
//!
//! Walks the delivery transition graph over the configured active phases.
//! Inactive phases are skipped transparently: the walk follows forward
//! edges through them until it reaches an active phase.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    DeliveryConfig, DeliveryPhase, DeliveryState, OrchestrationMode, PhaseResult,
    PhaseResultStatus, SessionId, WorkflowKind, WorkflowState,
};
use crate::domain::ports::StateStore;

const WORKFLOW: &str = "delivery";

/// First active phase reachable from `from`, following forward edges and
/// passing through inactive phases. Ties go to the earliest canonical phase.
pub fn next_active_phase(from: DeliveryPhase, active: &[DeliveryPhase]) -> Option<DeliveryPhase> {
    let mut frontier: BTreeSet<DeliveryPhase> = from.forward_successors().collect();
    let mut visited: BTreeSet<DeliveryPhase> = BTreeSet::new();

    while let Some(candidate) = frontier.pop_first() {
        if !visited.insert(candidate) {
            continue;
        }
        if active.contains(&candidate) {
            return Some(candidate);
        }
        frontier.extend(candidate.forward_successors().filter(|p| !visited.contains(p)));
    }
    None
}

/// Phase a new delivery lands in.
pub fn first_active_phase(active: &[DeliveryPhase]) -> Option<DeliveryPhase> {
    if active.contains(&DeliveryPhase::Discovery) {
        Some(DeliveryPhase::Discovery)
    } else {
        next_active_phase(DeliveryPhase::Discovery, active)
    }
}

/// Options for [`DeliveryCoordinator::start`].
#[derive(Debug, Clone, Default)]
pub struct DeliveryStart {
    pub mode: Option<String>,
    pub plan_path: Option<String>,
    pub rules_snapshot_hash: Option<String>,
}

pub struct DeliveryCoordinator {
    store: Arc<dyn StateStore>,
    session: SessionId,
    config: DeliveryConfig,
}

impl DeliveryCoordinator {
    pub fn new(store: Arc<dyn StateStore>, session: SessionId, config: DeliveryConfig) -> Self {
        Self {
            store,
            session,
            config,
        }
    }

    pub async fn state(&self) -> DomainResult<DeliveryState> {
        self.store
            .read(&self.session, WorkflowKind::Delivery)
            .await
            .and_then(WorkflowState::into_delivery)
            .ok_or_else(|| DomainError::NoActiveWorkflow(WORKFLOW.to_string()))
    }

    async fn save(&self, mut state: DeliveryState) -> DomainResult<DeliveryState> {
        state.last_updated = Utc::now();
        self.store
            .write(&self.session, &WorkflowState::Delivery(state.clone()))
            .await?;
        Ok(state)
    }

    pub async fn start(&self, slug: &str, options: DeliveryStart) -> DomainResult<DeliveryState> {
        if let Some(existing) = self
            .store
            .read(&self.session, WorkflowKind::Delivery)
            .await
            .and_then(WorkflowState::into_delivery)
        {
            if !existing.is_terminal() {
                return Err(DomainError::AlreadyActive {
                    workflow: WORKFLOW.to_string(),
                    slug: existing.slug,
                    phase: existing.delivery_phase.to_string(),
                });
            }
        }

        let mode = match options.mode.as_deref() {
            Some(raw) => OrchestrationMode::from_str(raw)
                .ok_or_else(|| DomainError::InvalidMode(raw.to_string()))?,
            None => self.config.default_mode,
        };
        let mut active_phases = self
            .config
            .active_phases
            .clone()
            .unwrap_or_else(|| mode.default_phases());
        active_phases.sort();
        active_phases.dedup();

        let first = first_active_phase(&active_phases)
            .ok_or_else(|| DomainError::NoReachablePhase("start".to_string()))?;

        let mut state = DeliveryState {
            delivery_phase: first,
            slug: slug.to_string(),
            orchestration_mode: mode,
            plan_path: options.plan_path,
            active_phases,
            active_roles: Vec::new(),
            phase_lead: None,
            skipped_phases: Vec::new(),
            phase_results: BTreeMap::new(),
            review_iteration: 0,
            max_review_iterations: self.config.max_review_iterations,
            rules_snapshot_hash: options.rules_snapshot_hash,
            last_updated: Utc::now(),
        };
        state.enter(first);

        info!(
            session = %self.session,
            slug,
            mode = mode.as_str(),
            phase = %first,
            "delivery workflow started"
        );
        self.save(state).await
    }

    /// Where `advance_phase` would land, without moving.
    pub async fn get_next_phase(&self) -> DomainResult<DeliveryPhase> {
        let state = self.state().await?;
        next_active_phase(state.delivery_phase, &state.active_phases)
            .ok_or_else(|| DomainError::NoReachablePhase(state.delivery_phase.to_string()))
    }

    /// Leave the current phase as passed and land on the next active one.
    pub async fn advance_phase(&self) -> DomainResult<DeliveryState> {
        let mut state = self.state().await?;
        advance(&mut state, PhaseResult::new(PhaseResultStatus::Passed, None))?;
        self.save(state).await
    }

    /// Record the current phase as skipped, then advance.
    pub async fn skip_phase(&self, reason: &str) -> DomainResult<DeliveryState> {
        let mut state = self.state().await?;
        let skipped = state.delivery_phase;
        advance(
            &mut state,
            PhaseResult::new(PhaseResultStatus::Skipped, Some(reason.to_string())),
        )?;
        if !state.skipped_phases.contains(&skipped) {
            state.skipped_phases.push(skipped);
        }
        info!(slug = %state.slug, phase = %skipped, reason, "delivery phase skipped");
        self.save(state).await
    }

    /// Send the delivery back to implementation from a review phase.
    pub async fn start_fix_loop(&self) -> DomainResult<DeliveryState> {
        let mut state = self.state().await?;
        let from = state.delivery_phase;
        if !from.allows_fix_loop() {
            return Err(DomainError::InvalidTransition {
                workflow: WORKFLOW.to_string(),
                from: from.to_string(),
                to: DeliveryPhase::Implementation.to_string(),
                legal: from.successors().iter().map(ToString::to_string).collect(),
            });
        }
        if state.review_iteration >= state.max_review_iterations {
            return Err(DomainError::MaxIterationsExceeded {
                iteration: state.review_iteration,
                max: state.max_review_iterations,
            });
        }

        state.review_iteration += 1;
        state.phase_results.insert(
            from,
            PhaseResult::new(
                PhaseResultStatus::Failed,
                Some(format!("fix loop iteration {}", state.review_iteration)),
            ),
        );
        state.enter(DeliveryPhase::Implementation);
        info!(
            slug = %state.slug,
            from = %from,
            iteration = state.review_iteration,
            max = state.max_review_iterations,
            "delivery fix loop started"
        );
        self.save(state).await
    }

    /// Close out `learning`. The phase itself does not change.
    pub async fn complete_delivery(&self) -> DomainResult<DeliveryState> {
        let mut state = self.state().await?;
        if state.delivery_phase != DeliveryPhase::Learning {
            return Err(DomainError::InvalidTransition {
                workflow: WORKFLOW.to_string(),
                from: state.delivery_phase.to_string(),
                to: DeliveryPhase::Learning.to_string(),
                legal: state
                    .delivery_phase
                    .successors()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }
        state.phase_results.insert(
            DeliveryPhase::Learning,
            PhaseResult::new(PhaseResultStatus::Passed, None),
        );
        info!(slug = %state.slug, "delivery workflow complete");
        self.save(state).await
    }
}

fn advance(state: &mut DeliveryState, departing: PhaseResult) -> DomainResult<()> {
    let from = state.delivery_phase;
    let next = next_active_phase(from, &state.active_phases)
        .ok_or_else(|| DomainError::NoReachablePhase(from.to_string()))?;
    state.phase_results.insert(from, departing);
    state.enter(next);
    info!(slug = %state.slug, from = %from, to = %next, lead = next.lead(), "delivery phase transition");
    Ok(())
}
