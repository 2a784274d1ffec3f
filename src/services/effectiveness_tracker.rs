//! Before/after failure-rate comparison for accepted rules.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EffectivenessVerdict, RuleBaseline, RuleEffectiveness};
use crate::domain::ports::{FailureLog, FailureQuery};

/// Floor on the baseline rate so a clean history doesn't divide by zero.
const MIN_BASELINE_RATE: f64 = 0.01;

/// Pure scoring step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectivenessScore {
    pub baseline_rate: f64,
    pub current_rate: f64,
    pub ratio: f64,
    pub score: f64,
    pub verdict: EffectivenessVerdict,
}

/// `score = clamp(1 - (current_rate / max(baseline_rate, 0.01)) / 2, 0, 1)`.
pub fn score_effectiveness(
    baseline_count: u64,
    baseline_window_days: u32,
    current_count: u64,
    sample_days: i64,
) -> EffectivenessScore {
    let baseline_rate = baseline_count as f64 / f64::from(baseline_window_days.max(1));
    let current_rate = current_count as f64 / sample_days.max(1) as f64;
    let ratio = current_rate / baseline_rate.max(MIN_BASELINE_RATE);
    let score = (1.0 - ratio / 2.0).clamp(0.0, 1.0);
    EffectivenessScore {
        baseline_rate,
        current_rate,
        ratio,
        score,
        verdict: EffectivenessVerdict::from_score(score),
    }
}

/// Whole days elapsed since the baseline, at least one.
pub fn sample_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(1)
}

pub struct EffectivenessTracker {
    failure_log: Arc<dyn FailureLog>,
    window_days: u32,
}

impl EffectivenessTracker {
    pub fn new(failure_log: Arc<dyn FailureLog>, window_days: u32) -> Self {
        Self {
            failure_log,
            window_days,
        }
    }

    /// Freeze the failure count of `category` over the trailing window.
    pub async fn snapshot_baseline(
        &self,
        proposal_id: Uuid,
        rule_path: &str,
        category: &str,
    ) -> DomainResult<RuleBaseline> {
        let now = Utc::now();
        let since = now - Duration::days(i64::from(self.window_days));
        let baseline_count = self
            .failure_log
            .count_failures(&FailureQuery::category(category).since(since))
            .await?;

        tracing::info!(
            proposal = %proposal_id,
            category,
            baseline_count,
            window_days = self.window_days,
            "rule baseline captured"
        );

        Ok(RuleBaseline {
            id: Uuid::new_v4(),
            proposal_id,
            rule_path: rule_path.to_string(),
            category: category.to_string(),
            baseline_count,
            baseline_window_days: self.window_days,
            created_at: now,
        })
    }

    /// Compare failures since the baseline against the frozen rate.
    pub async fn compute(&self, baseline: &RuleBaseline) -> DomainResult<RuleEffectiveness> {
        self.compute_at(baseline, Utc::now()).await
    }

    pub async fn compute_at(
        &self,
        baseline: &RuleBaseline,
        now: DateTime<Utc>,
    ) -> DomainResult<RuleEffectiveness> {
        let current_count = self
            .failure_log
            .count_failures(&FailureQuery::category(&baseline.category).since(baseline.created_at))
            .await?;
        let days = sample_days(baseline.created_at, now);
        let scored = score_effectiveness(
            baseline.baseline_count,
            baseline.baseline_window_days,
            current_count,
            days,
        );

        Ok(RuleEffectiveness {
            proposal_id: baseline.proposal_id,
            rule_path: baseline.rule_path.clone(),
            category: baseline.category.clone(),
            baseline_rate: scored.baseline_rate,
            current_count,
            sample_days: days,
            current_rate: scored.current_rate,
            ratio: scored.ratio,
            score: scored.score,
            verdict: scored.verdict,
        })
    }
}
