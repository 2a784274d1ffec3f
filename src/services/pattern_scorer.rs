//! Heuristic confidence scoring for pattern detections.
//!
//! Detections first pass a decision-tree filter (hard rejects, no candidate
//! emitted), then survivors are scored multiplicatively:
//!
//! ```text
//! confidence = min(1, base(type, count) × consistency × recency × scope × prior)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::domain::models::{Detection, DetectionType, PatternCandidate};
use crate::domain::ports::DecisionCounts;

/// Instance keys checked, in order, for a timestamp.
const TIMESTAMP_KEYS: [&str; 3] = ["timestamp", "date", "committed_at"];

/// Why a detection produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    BelowThreshold { count: u32, min: u32 },
    TooFewFiles { files: usize },
    CoolingDown { last_rejected_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedDetection {
    pub detection_type: DetectionType,
    pub description_hash: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringOutcome {
    pub candidates: Vec<PatternCandidate>,
    pub rejected: Vec<RejectedDetection>,
}

/// Filters and scores detections.
#[derive(Debug, Clone)]
pub struct PatternScorer {
    cooldown: Duration,
}

impl Default for PatternScorer {
    fn default() -> Self {
        Self::new(7)
    }
}

impl PatternScorer {
    pub fn new(cooldown_days: u32) -> Self {
        Self {
            cooldown: Duration::days(i64::from(cooldown_days)),
        }
    }

    /// Decision-tree filter. `cooldowns` maps description hashes to the most
    /// recent reject/ignore decision on a candidate with that hash.
    pub fn filter(
        &self,
        detection: &Detection,
        cooldowns: &HashMap<String, DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<RejectReason> {
        let min = detection.detection_type.min_count();
        if detection.count < min {
            return Some(RejectReason::BelowThreshold {
                count: detection.count,
                min,
            });
        }

        if detection.detection_type.requires_multiple_files() && detection.files.len() < 2 {
            return Some(RejectReason::TooFewFiles {
                files: detection.files.len(),
            });
        }

        if let Some(rejected_at) = cooldowns.get(&detection.description_hash()) {
            if now - *rejected_at < self.cooldown {
                return Some(RejectReason::CoolingDown {
                    last_rejected_at: *rejected_at,
                });
            }
        }

        None
    }

    /// Multiplicative confidence, capped at 1.0.
    pub fn score(&self, detection: &Detection, prior_factor: f64, now: DateTime<Utc>) -> f64 {
        let confidence = base_score(detection.detection_type, detection.count)
            * consistency_factor(&detection.instances)
            * recency_factor(&detection.instances, now)
            * scope_factor(&detection.files)
            * prior_factor;
        confidence.clamp(0.0, 1.0)
    }

    /// Filter and score a batch. Detection types missing from
    /// `prior_factors` score with a prior of 1.0.
    pub fn evaluate(
        &self,
        detections: Vec<Detection>,
        cooldowns: &HashMap<String, DateTime<Utc>>,
        prior_factors: &HashMap<DetectionType, f64>,
        now: DateTime<Utc>,
    ) -> ScoringOutcome {
        let mut outcome = ScoringOutcome::default();

        for detection in detections {
            if let Some(reason) = self.filter(&detection, cooldowns, now) {
                debug!(
                    detection_type = %detection.detection_type,
                    reason = ?reason,
                    "detection filtered"
                );
                outcome.rejected.push(RejectedDetection {
                    detection_type: detection.detection_type,
                    description_hash: detection.description_hash(),
                    reason,
                });
                continue;
            }

            let prior = prior_factors
                .get(&detection.detection_type)
                .copied()
                .unwrap_or(1.0);
            let confidence = self.score(&detection, prior, now);
            debug!(
                detection_type = %detection.detection_type,
                count = detection.count,
                confidence,
                "detection scored"
            );
            outcome
                .candidates
                .push(PatternCandidate::from_detection(detection, confidence));
        }

        outcome
    }
}

/// Count-driven base score relative to the type's minimum.
pub fn base_score(detection_type: DetectionType, count: u32) -> f64 {
    let threshold = f64::from(detection_type.min_count());
    let count = f64::from(count);
    if count < threshold {
        0.1 * count / threshold
    } else {
        0.3 + 0.5 * (count / (2.0 * threshold)).min(1.0)
    }
}

/// Repeated identical instances raise confidence; heterogeneous ones lower it.
pub fn consistency_factor(instances: &[serde_json::Map<String, serde_json::Value>]) -> f64 {
    if instances.is_empty() {
        return 1.0;
    }
    let unique: BTreeSet<String> = instances
        .iter()
        .map(|i| serde_json::Value::Object(i.clone()).to_string())
        .collect();
    let total = instances.len() as f64;
    1.0 - (unique.len() as f64 - 1.0) / total * 0.5
}

/// Age of the most recent timestamped instance, bucketed.
pub fn recency_factor(
    instances: &[serde_json::Map<String, serde_json::Value>],
    now: DateTime<Utc>,
) -> f64 {
    let Some(latest) = instances.iter().filter_map(instance_timestamp).max() else {
        return 1.0;
    };
    let age_hours = (now - latest).num_seconds() as f64 / 3600.0;
    if age_hours < 24.0 {
        1.0
    } else if age_hours < 168.0 {
        0.9
    } else if age_hours < 720.0 {
        0.7
    } else {
        0.5
    }
}

fn instance_timestamp(instance: &serde_json::Map<String, serde_json::Value>) -> Option<DateTime<Utc>> {
    TIMESTAMP_KEYS.iter().find_map(|key| match instance.get(*key)? {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    })
}

/// Cross-cutting patterns score higher: distinct first-level directories.
pub fn scope_factor(files: &BTreeSet<String>) -> f64 {
    let directories: BTreeSet<&str> = files.iter().map(|f| first_level_dir(f)).collect();
    match directories.len() {
        0 | 1 => 0.8,
        2 => 1.0,
        n => 1.0 + 0.1 * (n as f64 - 2.0),
    }
}

/// Prior from past decisions on a detection type: `0.5 + accept ratio`
/// once there is enough history, else neutral.
pub fn prior_factor_from_history(counts: DecisionCounts, min_decisions: u32) -> f64 {
    let total = counts.total();
    if total == 0 || total < min_decisions {
        return 1.0;
    }
    0.5 + f64::from(counts.accepted) / f64::from(total)
}

fn first_level_dir(path: &str) -> &str {
    let path = path.trim_start_matches("./").trim_start_matches('/');
    match path.split_once('/') {
        Some((dir, _)) => dir,
        None => ".",
    }
}
