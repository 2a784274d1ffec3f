//! Rule baselines and the effectiveness view computed from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Failure-rate snapshot frozen when a rule proposal is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBaseline {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub rule_path: String,
    pub category: String,
    pub baseline_count: u64,
    pub baseline_window_days: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectivenessVerdict {
    Effective,
    Neutral,
    Ineffective,
}

impl EffectivenessVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Effective => "effective",
            Self::Neutral => "neutral",
            Self::Ineffective => "ineffective",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score > 0.6 {
            Self::Effective
        } else if score >= 0.4 {
            Self::Neutral
        } else {
            Self::Ineffective
        }
    }
}

/// Computed on demand from a baseline and current failure counts; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffectiveness {
    pub proposal_id: Uuid,
    pub rule_path: String,
    pub category: String,
    pub baseline_rate: f64,
    pub current_count: u64,
    pub sample_days: i64,
    pub current_rate: f64,
    pub ratio: f64,
    pub score: f64,
    pub verdict: EffectivenessVerdict,
}
