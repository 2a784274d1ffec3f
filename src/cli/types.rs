//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::delivery::DeliveryArgs;
use super::commands::learn::LearnArgs;
use super::commands::spec::SpecArgs;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Waypoint - phase orchestration and rule learning", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Session whose workflow state to use
    #[arg(short, long, global = true, env = "WAYPOINT_SESSION", default_value = "default")]
    pub session: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Spec workflow: plan, implement, verify, learn
    Spec(SpecArgs),

    /// Delivery workflow across the nine delivery phases
    Delivery(DeliveryArgs),

    /// Pattern learning: detections, proposals, decisions, effectiveness
    Learn(LearnArgs),
}
