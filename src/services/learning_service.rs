//! Learning pipeline: detections in, reviewed artifacts out.
//!
//! ```text
//! ingest ─▶ candidates (pending) ─▶ propose ─▶ proposals (pending)
//!                                              │
//!                                    decide ◀──┘ accept → artifact + baseline
//! ```

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CandidateStatus, Decision, Detection, DetectionType, LearningConfig, Proposal, ProposalType,
    RuleBaseline, RuleEffectiveness,
};
use crate::domain::ports::{ArtifactWriter, FailureLog, LearningRepository, RuleIndex};
use crate::services::best_effort::best_effort;
use crate::services::effectiveness_tracker::EffectivenessTracker;
use crate::services::pattern_scorer::{prior_factor_from_history, PatternScorer, ScoringOutcome};
use crate::services::proposal_generator::{GeneratorConfig, ProposalGenerator};

/// Result of a decision call.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub proposal: Proposal,
    /// Written artifact, when the decision was `accept` and writing worked.
    pub artifact_path: Option<PathBuf>,
    /// Failure baseline for accepted rules.
    pub baseline: Option<RuleBaseline>,
}

/// Optional arguments to [`LearningService::decide`].
#[derive(Debug, Clone, Default)]
pub struct DecideOptions {
    pub edited_content: Option<String>,
    /// Failure category the rule targets; defaults to the detection type.
    pub category: Option<String>,
}

pub struct LearningService {
    repo: Arc<dyn LearningRepository>,
    rules: Arc<dyn RuleIndex>,
    artifacts: Arc<dyn ArtifactWriter>,
    tracker: EffectivenessTracker,
    scorer: PatternScorer,
    generator: ProposalGenerator,
    config: LearningConfig,
    project_root: PathBuf,
}

impl LearningService {
    pub fn new(
        repo: Arc<dyn LearningRepository>,
        failure_log: Arc<dyn FailureLog>,
        rules: Arc<dyn RuleIndex>,
        artifacts: Arc<dyn ArtifactWriter>,
        config: LearningConfig,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            rules,
            artifacts,
            tracker: EffectivenessTracker::new(failure_log, config.baseline_window_days),
            scorer: PatternScorer::new(config.cooldown_days),
            generator: ProposalGenerator::new(GeneratorConfig::from(&config)),
            config,
            project_root: project_root.into(),
        }
    }

    /// Filter and score analyzer output; persist surviving candidates.
    pub async fn ingest(&self, detections: Vec<Detection>) -> DomainResult<ScoringOutcome> {
        let now = Utc::now();
        let cooldowns = self
            .repo
            .recent_rejections(now - Duration::days(i64::from(self.config.cooldown_days)))
            .await?;

        let mut priors: HashMap<DetectionType, f64> = HashMap::new();
        for detection in &detections {
            if priors.contains_key(&detection.detection_type) {
                continue;
            }
            let counts = self.repo.decision_counts(detection.detection_type).await?;
            priors.insert(
                detection.detection_type,
                prior_factor_from_history(counts, self.config.min_decisions_for_prior),
            );
        }

        let received = detections.len();
        let outcome = self.scorer.evaluate(detections, &cooldowns, &priors, now);
        for candidate in &outcome.candidates {
            self.repo.save_candidate(candidate).await?;
        }

        info!(
            received,
            candidates = outcome.candidates.len(),
            rejected = outcome.rejected.len(),
            "detections ingested"
        );
        Ok(outcome)
    }

    /// Turn pending candidates into proposals, strongest first, up to the
    /// per-session cap.
    pub async fn propose(&self) -> DomainResult<Vec<Proposal>> {
        let mut candidates = self.repo.list_candidates(Some(CandidateStatus::Pending)).await?;
        candidates.sort_by(|a, b| b.confidence_final.total_cmp(&a.confidence_final));

        let existing = self.rules.existing_rules().await?;
        let proposals = self.generator.generate(&candidates, &existing);

        for proposal in &proposals {
            self.repo.save_proposal(proposal).await?;
            self.repo
                .update_candidate_status(proposal.candidate_id, CandidateStatus::Proposed)
                .await?;
        }

        info!(
            pending = candidates.len(),
            proposed = proposals.len(),
            existing_rules = existing.len(),
            "proposals generated"
        );
        Ok(proposals)
    }

    pub async fn list_proposals(&self) -> DomainResult<Vec<Proposal>> {
        self.repo.list_proposals(None).await
    }

    /// Record the single decision on a proposal.
    ///
    /// Accepting writes the artifact and, for rules, snapshots a failure
    /// baseline. Both are best effort: the decision stands if they fail.
    pub async fn decide(
        &self,
        proposal_id: Uuid,
        decision: Decision,
        options: DecideOptions,
    ) -> DomainResult<DecisionOutcome> {
        let mut proposal = self
            .repo
            .get_proposal(proposal_id)
            .await?
            .ok_or(DomainError::ProposalNotFound(proposal_id))?;
        if proposal.status.is_decided() {
            return Err(DomainError::AlreadyDecided {
                id: proposal_id,
                status: proposal.status.as_str().to_string(),
            });
        }
        let candidate = self
            .repo
            .get_candidate(proposal.candidate_id)
            .await?
            .ok_or(DomainError::CandidateNotFound(proposal.candidate_id))?;

        proposal.status = decision.resulting_status();
        proposal.decision = Some(decision);
        proposal.edited_content = options.edited_content;
        proposal.decided_at = Some(Utc::now());
        self.repo.record_decision(&proposal).await?;
        self.repo
            .update_candidate_status(candidate.id, CandidateStatus::Decided)
            .await?;

        info!(
            proposal = %proposal.id,
            decision = decision.as_str(),
            proposal_type = proposal.proposal_type.as_str(),
            "proposal decided"
        );

        let mut outcome = DecisionOutcome {
            proposal,
            artifact_path: None,
            baseline: None,
        };
        if decision != Decision::Accept {
            return Ok(outcome);
        }

        outcome.artifact_path = best_effort(
            "create artifact",
            self.artifacts.create_artifact(
                &outcome.proposal,
                &self.project_root,
                outcome.proposal.edited_content.as_deref(),
            ),
        )
        .await
        .flatten();

        if outcome.proposal.proposal_type == ProposalType::Rule {
            let rule_path = outcome
                .artifact_path
                .as_ref()
                .map(|p| p.display().to_string())
                .or_else(|| outcome.proposal.proposed_path.clone())
                .unwrap_or_default();
            let category = options
                .category
                .unwrap_or_else(|| candidate.detection_type.as_str().to_string());
            let proposal_id = outcome.proposal.id;
            outcome.baseline = best_effort("snapshot baseline", async {
                let baseline = self
                    .tracker
                    .snapshot_baseline(proposal_id, &rule_path, &category)
                    .await?;
                self.repo.save_baseline(&baseline).await?;
                Ok::<_, DomainError>(baseline)
            })
            .await;
        }

        Ok(outcome)
    }

    /// Effectiveness of an accepted rule against its baseline.
    pub async fn effectiveness(&self, proposal_id: Uuid) -> DomainResult<RuleEffectiveness> {
        let baseline = self
            .repo
            .baseline_for_proposal(proposal_id)
            .await?
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("no baseline recorded for proposal {proposal_id}"))
            })?;
        self.tracker.compute(&baseline).await
    }

    /// Effectiveness of every rule with a baseline.
    pub async fn effectiveness_report(&self) -> DomainResult<Vec<RuleEffectiveness>> {
        let baselines = self.repo.list_baselines().await?;
        let mut report = Vec::with_capacity(baselines.len());
        for baseline in &baselines {
            report.push(self.tracker.compute(baseline).await?);
        }
        Ok(report)
    }
}
