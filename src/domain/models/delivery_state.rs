//! Delivery workflow state, transition graph and role rosters.
//!
//! ```text
//! discovery → architecture → planning → implementation → qa → governance → performance → release → learning
//!     └──────────────────────↗                ↑           │        │  └──────────────────↗
//!                                             └───────────┴────────┴──── fix loop edges
//! ```
//!
//! Declaration order of [`DeliveryPhase`] is the canonical order and is what
//! `Ord` compares on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the nine delivery phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPhase {
    Discovery,
    Architecture,
    Planning,
    Implementation,
    Qa,
    Governance,
    Performance,
    Release,
    Learning,
}

/// All phases in canonical order.
pub const ALL_PHASES: [DeliveryPhase; 9] = [
    DeliveryPhase::Discovery,
    DeliveryPhase::Architecture,
    DeliveryPhase::Planning,
    DeliveryPhase::Implementation,
    DeliveryPhase::Qa,
    DeliveryPhase::Governance,
    DeliveryPhase::Performance,
    DeliveryPhase::Release,
    DeliveryPhase::Learning,
];

/// Phases activated by `classic` and `auto` orchestration.
pub const CLASSIC_PHASES: [DeliveryPhase; 5] = [
    DeliveryPhase::Planning,
    DeliveryPhase::Implementation,
    DeliveryPhase::Qa,
    DeliveryPhase::Release,
    DeliveryPhase::Learning,
];

impl DeliveryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Architecture => "architecture",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Qa => "qa",
            Self::Governance => "governance",
            Self::Performance => "performance",
            Self::Release => "release",
            Self::Learning => "learning",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        ALL_PHASES
            .iter()
            .copied()
            .find(|p| p.as_str() == s.to_lowercase())
    }

    /// Every outgoing edge of the transition graph, including fix-loop edges.
    pub fn successors(&self) -> &'static [DeliveryPhase] {
        use DeliveryPhase::{
            Architecture, Discovery, Governance, Implementation, Learning, Performance, Planning,
            Qa, Release,
        };
        match self {
            Discovery => &[Architecture, Planning],
            Architecture => &[Planning],
            Planning => &[Implementation],
            Implementation => &[Qa],
            Qa => &[Implementation, Governance],
            Governance => &[Implementation, Performance, Release],
            Performance => &[Implementation, Release],
            Release => &[Learning],
            Learning => &[],
        }
    }

    /// Successors that move forward in canonical order. Backward edges are
    /// fix-loop edges and are only taken by an explicit fix loop.
    pub fn forward_successors(&self) -> impl Iterator<Item = DeliveryPhase> + '_ {
        self.successors().iter().copied().filter(move |next| next > self)
    }

    /// Phases a fix loop may be started from.
    pub fn allows_fix_loop(&self) -> bool {
        matches!(self, Self::Qa | Self::Governance | Self::Performance)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Learning)
    }

    /// Static role roster for this phase.
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            Self::Discovery => &["product-manager", "analyst"],
            Self::Architecture => &["architect", "tech-lead"],
            Self::Planning => &["tech-lead", "product-manager"],
            Self::Implementation => &["developer", "tech-lead"],
            Self::Qa => &["qa-engineer", "developer"],
            Self::Governance => &["security-reviewer", "compliance-reviewer"],
            Self::Performance => &["performance-engineer"],
            Self::Release => &["release-manager", "devops"],
            Self::Learning => &["knowledge-curator"],
        }
    }

    /// Role leading this phase.
    pub fn lead(&self) -> &'static str {
        self.roles()[0]
    }
}

impl std::fmt::Display for DeliveryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many phases a delivery runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    #[default]
    Classic,
    Swarm,
    Auto,
}

impl OrchestrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Swarm => "swarm",
            Self::Auto => "auto",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "classic" => Some(Self::Classic),
            "swarm" => Some(Self::Swarm),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// Active phase set when no explicit subset is configured.
    pub fn default_phases(&self) -> Vec<DeliveryPhase> {
        match self {
            Self::Classic | Self::Auto => CLASSIC_PHASES.to_vec(),
            Self::Swarm => ALL_PHASES.to_vec(),
        }
    }
}

/// Outcome recorded when a phase is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseResultStatus {
    Passed,
    Failed,
    Skipped,
}

impl PhaseResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub status: PhaseResultStatus,
    #[serde(default)]
    pub details: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PhaseResult {
    pub fn new(status: PhaseResultStatus, details: Option<String>) -> Self {
        Self {
            status,
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Persisted state of a delivery workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryState {
    pub delivery_phase: DeliveryPhase,
    pub slug: String,
    pub orchestration_mode: OrchestrationMode,
    #[serde(default)]
    pub plan_path: Option<String>,
    /// Phases that execute; everything else is walked through.
    pub active_phases: Vec<DeliveryPhase>,
    pub active_roles: Vec<String>,
    #[serde(default)]
    pub phase_lead: Option<String>,
    #[serde(default)]
    pub skipped_phases: Vec<DeliveryPhase>,
    #[serde(default)]
    pub phase_results: BTreeMap<DeliveryPhase, PhaseResult>,
    pub review_iteration: u32,
    pub max_review_iterations: u32,
    #[serde(default)]
    pub rules_snapshot_hash: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl DeliveryState {
    /// Enter `phase`: sets the phase and recomputes the roster.
    pub fn enter(&mut self, phase: DeliveryPhase) {
        self.delivery_phase = phase;
        self.active_roles = phase.roles().iter().map(|r| (*r).to_string()).collect();
        self.phase_lead = Some(phase.lead().to_string());
        self.last_updated = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.delivery_phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let mut sorted = ALL_PHASES;
        sorted.sort();
        assert_eq!(sorted, ALL_PHASES);
        assert!(DeliveryPhase::Discovery < DeliveryPhase::Learning);
    }

    #[test]
    fn test_forward_successors_drop_fix_loop_edges() {
        let qa: Vec<_> = DeliveryPhase::Qa.forward_successors().collect();
        assert_eq!(qa, vec![DeliveryPhase::Governance]);
        let gov: Vec<_> = DeliveryPhase::Governance.forward_successors().collect();
        assert_eq!(gov, vec![DeliveryPhase::Performance, DeliveryPhase::Release]);
    }

    #[test]
    fn test_fix_loop_phases() {
        let allowed: Vec<_> = ALL_PHASES.iter().filter(|p| p.allows_fix_loop()).collect();
        assert_eq!(
            allowed,
            vec![&DeliveryPhase::Qa, &DeliveryPhase::Governance, &DeliveryPhase::Performance]
        );
    }

    #[test]
    fn test_mode_default_phases() {
        assert_eq!(OrchestrationMode::Classic.default_phases().len(), 5);
        assert_eq!(OrchestrationMode::Auto.default_phases().len(), 5);
        assert_eq!(OrchestrationMode::Swarm.default_phases().len(), 9);
        assert_eq!(OrchestrationMode::from_str("SWARM"), Some(OrchestrationMode::Swarm));
        assert_eq!(OrchestrationMode::from_str("waterfall"), None);
    }

    #[test]
    fn test_every_phase_has_a_lead() {
        for phase in ALL_PHASES {
            assert!(phase.roles().contains(&phase.lead()));
            assert_eq!(DeliveryPhase::from_str(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn test_phase_results_serialize_with_phase_keys() {
        let mut results = BTreeMap::new();
        results.insert(
            DeliveryPhase::Qa,
            PhaseResult::new(PhaseResultStatus::Skipped, Some("no tests".to_string())),
        );
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["qa"]["status"], "skipped");
    }
}
