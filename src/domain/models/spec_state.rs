//! Spec workflow state and its phase legality tables.
//!
//! A spec workflow drives a single feature from plan to learn:
//!
//! ```text
//! standard:  plan → implement → verify → learn
//!                       ↖──────────┘ (fix loop)
//!
//! extended:  discovery → design → plan → implement → verify → governance → accept → learn
//!                 └──────────────↗            ↖──────────┘          │
//!                                             ↖─────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::review::ReviewAggregate;

/// Phase of a spec workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecPhase {
    Discovery,
    Design,
    Plan,
    Implement,
    Verify,
    Governance,
    Accept,
    Learn,
}

impl SpecPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Design => "design",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Verify => "verify",
            Self::Governance => "governance",
            Self::Accept => "accept",
            Self::Learn => "learn",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "discovery" => Some(Self::Discovery),
            "design" => Some(Self::Design),
            "plan" => Some(Self::Plan),
            "implement" => Some(Self::Implement),
            "verify" => Some(Self::Verify),
            "governance" => Some(Self::Governance),
            "accept" => Some(Self::Accept),
            "learn" => Some(Self::Learn),
            _ => None,
        }
    }

    /// `learn` is the only terminal phase in either table.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Learn)
    }
}

impl std::fmt::Display for SpecPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which legality table a spec workflow follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecVariant {
    /// plan, implement, verify, learn
    #[default]
    Standard,
    /// Adds discovery, design, governance and accept.
    Extended,
}

impl SpecVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        }
    }

    /// Phases that belong to this variant, in order.
    pub fn phases(&self) -> &'static [SpecPhase] {
        match self {
            Self::Standard => &[
                SpecPhase::Plan,
                SpecPhase::Implement,
                SpecPhase::Verify,
                SpecPhase::Learn,
            ],
            Self::Extended => &[
                SpecPhase::Discovery,
                SpecPhase::Design,
                SpecPhase::Plan,
                SpecPhase::Implement,
                SpecPhase::Verify,
                SpecPhase::Governance,
                SpecPhase::Accept,
                SpecPhase::Learn,
            ],
        }
    }

    /// Phase a freshly started workflow lands in.
    pub fn initial_phase(&self) -> SpecPhase {
        match self {
            Self::Standard => SpecPhase::Plan,
            Self::Extended => SpecPhase::Discovery,
        }
    }

    /// Legal successors of `phase` under this variant.
    pub fn successors(&self, phase: SpecPhase) -> &'static [SpecPhase] {
        use SpecPhase::{Accept, Design, Discovery, Governance, Implement, Learn, Plan, Verify};
        match self {
            Self::Standard => match phase {
                Plan => &[Implement],
                Implement => &[Verify],
                Verify => &[Implement, Learn],
                _ => &[],
            },
            Self::Extended => match phase {
                Discovery => &[Design, Plan],
                Design => &[Plan],
                Plan => &[Implement],
                Implement => &[Verify],
                Verify => &[Implement, Governance],
                Governance => &[Implement, Accept],
                Accept => &[Learn],
                Learn => &[],
            },
        }
    }

    pub fn can_transition(&self, from: SpecPhase, to: SpecPhase) -> bool {
        self.successors(from).contains(&to)
    }
}

/// Lifecycle of the plan document attached to a spec workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Approved,
    Implementing,
    Verifying,
    Complete,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Implementing => "implementing",
            Self::Verifying => "verifying",
            Self::Complete => "complete",
        }
    }
}

/// A git worktree isolated for the workflow's implementation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeInfo {
    pub path: String,
    pub branch: String,
    pub base_branch: String,
}

/// Persisted state of a spec workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecState {
    pub phase: SpecPhase,
    #[serde(default)]
    pub variant: SpecVariant,
    pub slug: String,
    #[serde(default)]
    pub plan_path: Option<String>,
    pub plan_status: PlanStatus,
    #[serde(default)]
    pub worktree: Option<WorktreeInfo>,
    pub current_task: u32,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub review_iteration: u32,
    pub max_review_iterations: u32,
    /// Aggregate of the most recent verify cycle.
    #[serde(default)]
    pub last_review: Option<ReviewAggregate>,
    pub last_updated: DateTime<Utc>,
}

impl SpecState {
    pub fn new(
        slug: impl Into<String>,
        plan_path: Option<String>,
        variant: SpecVariant,
        max_review_iterations: u32,
    ) -> Self {
        Self {
            phase: variant.initial_phase(),
            variant,
            slug: slug.into(),
            plan_path,
            plan_status: PlanStatus::Draft,
            worktree: None,
            current_task: 0,
            total_tasks: 0,
            completed_tasks: 0,
            review_iteration: 0,
            max_review_iterations,
            last_review: None,
            last_updated: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn all_tasks_done(&self) -> bool {
        self.completed_tasks >= self.total_tasks
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
