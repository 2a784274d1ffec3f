//! Waypoint - phase orchestration and rule learning for AI coding assistants
//!
//! Waypoint drives a feature through two persisted phase state machines
//! (the spec workflow and the nine-phase delivery workflow) and learns
//! project rules from recurring code patterns.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, port traits and the error taxonomy
//! - **Service Layer** (`services`): coordinators and the learning pipeline
//! - **Adapters** (`adapters`): file, SQLite and git implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use waypoint::adapters::InMemoryStateStore;
//! use waypoint::domain::models::{SessionId, SpecConfig};
//! use waypoint::services::SpecCoordinator;
//!
//! # async fn demo() -> waypoint::domain::DomainResult<()> {
//! let spec = SpecCoordinator::new(Arc::new(InMemoryStateStore::new()), SessionId::new("s1"), SpecConfig::default());
//! spec.start("feature-x", Some("plans/feature-x.md".into())).await?;
//! spec.approve_plan(3).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, DeliveryPhase, DeliveryState, Detection, OrchestrationMode, Proposal, SessionId, SpecPhase,
    SpecState, SpecVariant,
};
pub use domain::ports::{ArtifactWriter, FailureLog, LearningRepository, RuleIndex, StateStore, WorktreeManager};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DeliveryCoordinator, LearningService, SpecCoordinator};
