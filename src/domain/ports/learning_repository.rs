//! Learning database port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CandidateStatus, DetectionType, PatternCandidate, Proposal, ProposalStatus, RuleBaseline,
};

/// Historical decisions on proposals derived from one detection type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub accepted: u32,
    /// Rejected and ignored proposals.
    pub rejected: u32,
}

impl DecisionCounts {
    pub fn total(&self) -> u32 {
        self.accepted + self.rejected
    }
}

/// Repository interface for the learning pipeline. Candidates are never
/// deleted; they are the history cooldown checks run against.
#[async_trait]
pub trait LearningRepository: Send + Sync {
    async fn save_candidate(&self, candidate: &PatternCandidate) -> DomainResult<()>;

    async fn get_candidate(&self, id: Uuid) -> DomainResult<Option<PatternCandidate>>;

    async fn list_candidates(
        &self,
        status: Option<CandidateStatus>,
    ) -> DomainResult<Vec<PatternCandidate>>;

    async fn update_candidate_status(&self, id: Uuid, status: CandidateStatus) -> DomainResult<()>;

    /// Description hashes with a reject/ignore decision at or after `since`,
    /// mapped to the most recent such decision.
    async fn recent_rejections(
        &self,
        since: DateTime<Utc>,
    ) -> DomainResult<HashMap<String, DateTime<Utc>>>;

    async fn decision_counts(&self, detection_type: DetectionType) -> DomainResult<DecisionCounts>;

    async fn save_proposal(&self, proposal: &Proposal) -> DomainResult<()>;

    async fn get_proposal(&self, id: Uuid) -> DomainResult<Option<Proposal>>;

    async fn list_proposals(&self, status: Option<ProposalStatus>) -> DomainResult<Vec<Proposal>>;

    /// Persist status, decision, edited content and decision time.
    ///
    /// Succeeds only while the stored proposal is undecided, so concurrent
    /// callers cannot both decide it. Fails with `AlreadyDecided` otherwise.
    async fn record_decision(&self, proposal: &Proposal) -> DomainResult<()>;

    async fn save_baseline(&self, baseline: &RuleBaseline) -> DomainResult<()>;

    async fn baseline_for_proposal(&self, proposal_id: Uuid) -> DomainResult<Option<RuleBaseline>>;

    async fn list_baselines(&self) -> DomainResult<Vec<RuleBaseline>>;
}
