//! Artifact proposals awaiting a human decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pattern::DetectionType;

/// Artifact a proposal would materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    Rule,
    Adr,
    Template,
    ProjectGraph,
    Skill,
}

impl ProposalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Adr => "adr",
            Self::Template => "template",
            Self::ProjectGraph => "project_graph",
            Self::Skill => "skill",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rule" => Some(Self::Rule),
            "adr" => Some(Self::Adr),
            "template" => Some(Self::Template),
            "project_graph" => Some(Self::ProjectGraph),
            "skill" => Some(Self::Skill),
            _ => None,
        }
    }

    /// Fixed mapping from detection kind to proposal kind.
    pub fn for_detection(detection_type: DetectionType) -> Self {
        match detection_type {
            DetectionType::CodePattern
            | DetectionType::FixPattern
            | DetectionType::ImportPattern
            | DetectionType::ConfigPattern => Self::Rule,
            DetectionType::StructuralChange => Self::Template,
            DetectionType::ServiceDetected => Self::ProjectGraph,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Presented,
    Accepted,
    Rejected,
    Ignored,
    Snoozed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Presented => "presented",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
            Self::Snoozed => "snoozed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "presented" => Some(Self::Presented),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "ignored" => Some(Self::Ignored),
            "snoozed" => Some(Self::Snoozed),
            _ => None,
        }
    }

    /// Whether a decision has already been recorded.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending | Self::Presented)
    }
}

/// Human decision on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    Ignore,
    Snooze,
}

impl Decision {
    pub const ALL: [Decision; 4] = [Self::Accept, Self::Reject, Self::Ignore, Self::Snooze];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Ignore => "ignore",
            Self::Snooze => "snooze",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            "ignore" => Some(Self::Ignore),
            "snooze" => Some(Self::Snooze),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> ProposalStatus {
        match self {
            Self::Accept => ProposalStatus::Accepted,
            Self::Reject => ProposalStatus::Rejected,
            Self::Ignore => ProposalStatus::Ignored,
            Self::Snooze => ProposalStatus::Snoozed,
        }
    }

    /// Decisions that start a cooldown for the pattern.
    pub fn starts_cooldown(&self) -> bool {
        matches!(self, Self::Reject | Self::Ignore)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub proposal_type: ProposalType,
    pub title: String,
    pub description: String,
    pub proposed_content: String,
    #[serde(default)]
    pub proposed_path: Option<String>,
    pub confidence: f64,
    pub status: ProposalStatus,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub edited_content: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Proposal {
    /// Content to materialize: the human edit if any, else the proposal.
    pub fn effective_content(&self) -> &str {
        self.edited_content.as_deref().unwrap_or(&self.proposed_content)
    }
}
