pub mod best_effort;
pub mod delivery_coordinator;
pub mod effectiveness_tracker;
pub mod learning_service;
pub mod pattern_scorer;
pub mod proposal_generator;
pub mod spec_coordinator;
pub mod verdict_aggregator;

pub use best_effort::best_effort;
pub use delivery_coordinator::{DeliveryCoordinator, DeliveryStart};
pub use effectiveness_tracker::{score_effectiveness, EffectivenessScore, EffectivenessTracker};
pub use learning_service::{DecideOptions, DecisionOutcome, LearningService};
pub use pattern_scorer::{PatternScorer, RejectReason, RejectedDetection, ScoringOutcome};
pub use proposal_generator::{GeneratorConfig, ProposalGenerator};
pub use spec_coordinator::SpecCoordinator;
pub use verdict_aggregator::{aggregate_verdicts, build_fix_instructions, parse_verdict};
