//! Pattern detections and the candidates scored from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Kind of repeated pattern an analyzer reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    CodePattern,
    StructuralChange,
    FixPattern,
    ImportPattern,
    ConfigPattern,
    ServiceDetected,
}

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodePattern => "code_pattern",
            Self::StructuralChange => "structural_change",
            Self::FixPattern => "fix_pattern",
            Self::ImportPattern => "import_pattern",
            Self::ConfigPattern => "config_pattern",
            Self::ServiceDetected => "service_detected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "code_pattern" => Some(Self::CodePattern),
            "structural_change" => Some(Self::StructuralChange),
            "fix_pattern" => Some(Self::FixPattern),
            "import_pattern" => Some(Self::ImportPattern),
            "config_pattern" => Some(Self::ConfigPattern),
            "service_detected" => Some(Self::ServiceDetected),
            _ => None,
        }
    }

    /// Minimum occurrence count before a detection can become a candidate.
    pub fn min_count(&self) -> u32 {
        match self {
            Self::CodePattern | Self::ImportPattern => 3,
            Self::StructuralChange | Self::ConfigPattern => 2,
            Self::FixPattern => 5,
            Self::ServiceDetected => 1,
        }
    }

    /// Whether the pattern must span at least two files.
    pub fn requires_multiple_files(&self) -> bool {
        !matches!(self, Self::ServiceDetected)
    }
}

impl std::fmt::Display for DetectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw detection handed over by a git/AST analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub detection_type: DetectionType,
    pub count: u32,
    #[serde(default)]
    pub confidence_raw: f64,
    #[serde(default)]
    pub files: BTreeSet<String>,
    pub description: String,
    #[serde(default)]
    pub instances: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl Detection {
    pub fn description_hash(&self) -> String {
        description_hash(self.detection_type, &self.description)
    }
}

/// Stable fingerprint of a pattern, used for deduplication and cooldown.
///
/// Whitespace runs and case are normalized so cosmetic rewording of the same
/// analyzer output maps to the same hash.
pub fn description_hash(detection_type: DetectionType, description: &str) -> String {
    let normalized = description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(detection_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Lifecycle of a candidate. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Interpreted,
    Proposed,
    Decided,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Interpreted => "interpreted",
            Self::Proposed => "proposed",
            Self::Decided => "decided",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "interpreted" => Some(Self::Interpreted),
            "proposed" => Some(Self::Proposed),
            "decided" => Some(Self::Decided),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        next > *self
    }
}

/// A detection that survived filtering, with its final confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    pub id: Uuid,
    pub detection_type: DetectionType,
    pub description: String,
    pub description_hash: String,
    pub count: u32,
    pub files: BTreeSet<String>,
    pub instances: Vec<serde_json::Map<String, serde_json::Value>>,
    pub confidence_raw: f64,
    pub confidence_final: f64,
    pub status: CandidateStatus,
    pub created_at: DateTime<Utc>,
}

impl PatternCandidate {
    pub fn from_detection(detection: Detection, confidence_final: f64) -> Self {
        let description_hash = detection.description_hash();
        Self {
            id: Uuid::new_v4(),
            detection_type: detection.detection_type,
            description: detection.description,
            description_hash,
            count: detection.count,
            files: detection.files,
            instances: detection.instances,
            confidence_raw: detection.confidence_raw,
            confidence_final,
            status: CandidateStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
