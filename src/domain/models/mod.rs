pub mod config;
pub mod delivery_state;
pub mod effectiveness;
pub mod pattern;
pub mod proposal;
pub mod review;
pub mod spec_state;
pub mod workflow_state;

pub use config::{
    Config, DatabaseConfig, DeliveryConfig, LearningConfig, LoggingConfig, SpecConfig,
};
pub use delivery_state::{
    DeliveryPhase, DeliveryState, OrchestrationMode, PhaseResult, PhaseResultStatus, ALL_PHASES,
};
pub use effectiveness::{EffectivenessVerdict, RuleBaseline, RuleEffectiveness};
pub use pattern::{description_hash, CandidateStatus, Detection, DetectionType, PatternCandidate};
pub use proposal::{Decision, Proposal, ProposalStatus, ProposalType};
pub use review::{Finding, ReviewAggregate, ReviewVerdict, Severity, Verdict};
pub use spec_state::{PlanStatus, SpecPhase, SpecState, SpecVariant, WorktreeInfo};
pub use workflow_state::{SessionId, WorkflowKind, WorkflowState};
