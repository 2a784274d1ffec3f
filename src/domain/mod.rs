//! Domain layer for the Waypoint orchestration core
//!
//! Pure models, collaborator ports and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
