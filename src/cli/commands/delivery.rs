//! Delivery workflow CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{DeliveryPhase, DeliveryState};
use crate::services::DeliveryStart;

#[derive(Args, Debug)]
pub struct DeliveryArgs {
    #[command(subcommand)]
    pub command: DeliveryCommands,
}

#[derive(Subcommand, Debug)]
pub enum DeliveryCommands {
    /// Start a delivery workflow
    Start {
        /// Feature slug
        slug: String,
        /// Orchestration mode: classic, swarm or auto
        #[arg(short, long)]
        mode: Option<String>,
        /// Path to the plan document
        #[arg(short, long)]
        plan: Option<String>,
        /// Record a hash of the current rule files with the delivery
        #[arg(long)]
        snapshot_rules: bool,
    },
    /// Show the current delivery state
    Status,
    /// Show the next active phase
    Next,
    /// Pass the current phase and move to the next active one
    Advance,
    /// Skip the current phase
    Skip {
        /// Why the phase was skipped
        #[arg(short, long)]
        reason: String,
    },
    /// Return to implementation from qa, governance or performance
    FixLoop,
    /// Complete the delivery
    Complete,
}

#[derive(Debug, serde::Serialize)]
pub struct DeliveryStateOutput {
    pub state: DeliveryState,
}

impl CommandOutput for DeliveryStateOutput {
    fn to_human(&self) -> String {
        let s = &self.state;
        let active: Vec<&str> = s.active_phases.iter().map(DeliveryPhase::as_str).collect();
        let mut lines = vec![
            format!("Delivery: {}", s.slug),
            format!(
                "Phase: {} (lead: {})",
                s.delivery_phase,
                s.phase_lead.as_deref().unwrap_or("-")
            ),
            format!("Mode: {}", s.orchestration_mode.as_str()),
            format!("Active phases: {}", active.join(", ")),
            format!("Roles: {}", s.active_roles.join(", ")),
            format!("Review iteration: {}/{}", s.review_iteration, s.max_review_iterations),
        ];

        if !s.phase_results.is_empty() {
            let mut table = list_table(&["phase", "result", "details"]);
            for (phase, result) in &s.phase_results {
                table.add_row(vec![
                    phase.as_str().to_string(),
                    result.status.as_str().to_string(),
                    result.details.clone().unwrap_or_default(),
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct NextPhaseOutput {
    pub next_phase: DeliveryPhase,
}

impl CommandOutput for NextPhaseOutput {
    fn to_human(&self) -> String {
        format!("Next phase: {}", self.next_phase)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: DeliveryArgs, ctx: AppContext, json_mode: bool) -> Result<()> {
    let coordinator = ctx.delivery_coordinator();

    let state = match args.command {
        DeliveryCommands::Start {
            slug,
            mode,
            plan,
            snapshot_rules,
        } => {
            let rules_snapshot_hash = if snapshot_rules {
                Some(
                    ctx.rule_library()
                        .snapshot_hash()
                        .await
                        .context("Failed to hash rule files")?,
                )
            } else {
                None
            };
            let options = DeliveryStart {
                mode,
                plan_path: plan,
                rules_snapshot_hash,
            };
            coordinator.start(&slug, options).await?
        }
        DeliveryCommands::Status => coordinator.state().await?,
        DeliveryCommands::Next => {
            let next_phase = coordinator.get_next_phase().await?;
            output(&NextPhaseOutput { next_phase }, json_mode);
            return Ok(());
        }
        DeliveryCommands::Advance => coordinator.advance_phase().await?,
        DeliveryCommands::Skip { reason } => coordinator.skip_phase(&reason).await?,
        DeliveryCommands::FixLoop => coordinator.start_fix_loop().await?,
        DeliveryCommands::Complete => coordinator.complete_delivery().await?,
    };

    output(&DeliveryStateOutput { state }, json_mode);
    Ok(())
}
