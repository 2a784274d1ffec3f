//! CLI command implementations.

pub mod delivery;
pub mod learn;
pub mod spec;
