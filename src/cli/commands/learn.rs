//! Learning pipeline CLI commands.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput, MessageOutput};
use crate::domain::models::{
    Decision, Detection, PatternCandidate, Proposal, ProposalStatus, RuleBaseline, RuleEffectiveness,
};
use crate::domain::ports::{FailureLog, FailureQuery};
use crate::services::pattern_scorer::RejectedDetection;
use crate::services::DecideOptions;

#[derive(Args, Debug)]
pub struct LearnArgs {
    #[command(subcommand)]
    pub command: LearnCommands,
}

#[derive(Subcommand, Debug)]
pub enum LearnCommands {
    /// Score analyzer detections and keep the candidates that pass
    Ingest {
        /// JSON array of detections; `-` reads stdin
        file: PathBuf,
    },
    /// Generate proposals from pending candidates
    Propose,
    /// List proposals
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Record the decision on a proposal
    Decide {
        /// Proposal ID
        id: Uuid,
        /// accept, reject, ignore or snooze
        decision: String,
        /// File with reviewer-edited content to write instead of the proposal
        #[arg(long)]
        edited: Option<PathBuf>,
        /// Failure category the rule targets (defaults to the detection type)
        #[arg(long)]
        category: Option<String>,
    },
    /// Show rule effectiveness (all rules when no ID is given)
    Effectiveness {
        /// Proposal ID
        id: Option<Uuid>,
    },
    /// Failure log commands
    #[command(subcommand)]
    Failure(FailureCommands),
}

#[derive(Subcommand, Debug)]
pub enum FailureCommands {
    /// Record a failure event
    Record {
        /// Failure category (lint, test, review, ...)
        category: String,
        /// Failure detail
        detail: String,
        /// File the failure concerns
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Count failure events
    Count {
        #[arg(short, long)]
        category: Option<String>,
        /// Only count failures from the last N days
        #[arg(long)]
        since_days: Option<i64>,
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct IngestOutput {
    pub candidates: Vec<PatternCandidate>,
    pub rejected: Vec<RejectedDetection>,
}

impl CommandOutput for IngestOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["confidence", "type", "count", "description"]);
        for c in &self.candidates {
            table.add_row(vec![
                format!("{:.2}", c.confidence_final),
                c.detection_type.as_str().to_string(),
                c.count.to_string(),
                truncate(&c.description, 60),
            ]);
        }
        let mut out = render_list("candidate", &table, self.candidates.len());
        if !self.rejected.is_empty() {
            out.push_str(&format!("\n{} detection(s) filtered out", self.rejected.len()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ProposalListOutput {
    pub proposals: Vec<Proposal>,
    pub total: usize,
}

impl CommandOutput for ProposalListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "status", "type", "confidence", "title"]);
        for p in &self.proposals {
            table.add_row(vec![
                p.id.to_string(),
                p.status.as_str().to_string(),
                p.proposal_type.as_str().to_string(),
                format!("{:.2}", p.confidence),
                truncate(&p.title, 60),
            ]);
        }
        render_list("proposal", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct DecisionOutput {
    pub proposal: Proposal,
    pub artifact_path: Option<String>,
    pub baseline: Option<RuleBaseline>,
}

impl CommandOutput for DecisionOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Proposal {} is now {}",
            self.proposal.id,
            self.proposal.status.as_str()
        )];
        if let Some(path) = &self.artifact_path {
            lines.push(format!("Wrote {path}"));
        }
        if let Some(baseline) = &self.baseline {
            lines.push(format!(
                "Baseline: {} '{}' failure(s) over {} day(s)",
                baseline.baseline_count, baseline.category, baseline.baseline_window_days
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EffectivenessOutput {
    pub rules: Vec<RuleEffectiveness>,
}

impl CommandOutput for EffectivenessOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["rule", "category", "baseline/day", "current/day", "score", "verdict"]);
        for r in &self.rules {
            table.add_row(vec![
                truncate(&r.rule_path, 48),
                r.category.clone(),
                format!("{:.3}", r.baseline_rate),
                format!("{:.3}", r.current_rate),
                format!("{:.2}", r.score),
                r.verdict.as_str().to_string(),
            ]);
        }
        render_list("rule", &table, self.rules.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct FailureCountOutput {
    pub count: u64,
}

impl CommandOutput for FailureCountOutput {
    fn to_human(&self) -> String {
        format!("{} failure(s)", self.count)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn read_detections(file: &Path) -> Result<Vec<Detection>> {
    let raw = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read detections from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?
    };
    serde_json::from_str(&raw).context("Detections must be a JSON array")
}

pub async fn execute(args: LearnArgs, ctx: AppContext, json_mode: bool) -> Result<()> {
    match args.command {
        LearnCommands::Failure(command) => execute_failure(command, &ctx, json_mode).await,
        command => execute_pipeline(command, &ctx, json_mode).await,
    }
}

async fn execute_pipeline(command: LearnCommands, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let service = ctx.learning_service().await?;

    match command {
        LearnCommands::Ingest { file } => {
            let detections = read_detections(&file)?;
            let outcome = service.ingest(detections).await?;
            let out = IngestOutput {
                candidates: outcome.candidates,
                rejected: outcome.rejected,
            };
            output(&out, json_mode);
        }

        LearnCommands::Propose => {
            let proposals = service.propose().await?;
            let out = ProposalListOutput {
                total: proposals.len(),
                proposals,
            };
            output(&out, json_mode);
        }

        LearnCommands::List { status } => {
            let mut proposals = service.list_proposals().await?;
            if let Some(status_str) = status {
                let status = ProposalStatus::from_str(&status_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", status_str))?;
                proposals.retain(|p| p.status == status);
            }
            let out = ProposalListOutput {
                total: proposals.len(),
                proposals,
            };
            output(&out, json_mode);
        }

        LearnCommands::Decide {
            id,
            decision,
            edited,
            category,
        } => {
            let decision = Decision::from_str(&decision)
                .ok_or_else(|| anyhow::anyhow!("Invalid decision: {}", decision))?;
            let edited_content = edited
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .transpose()?;
            let outcome = service
                .decide(
                    id,
                    decision,
                    DecideOptions {
                        edited_content,
                        category,
                    },
                )
                .await?;
            let out = DecisionOutput {
                proposal: outcome.proposal,
                artifact_path: outcome.artifact_path.map(|p| p.display().to_string()),
                baseline: outcome.baseline,
            };
            output(&out, json_mode);
        }

        LearnCommands::Effectiveness { id } => {
            let rules = match id {
                Some(id) => vec![service.effectiveness(id).await?],
                None => service.effectiveness_report().await?,
            };
            output(&EffectivenessOutput { rules }, json_mode);
        }

        LearnCommands::Failure(command) => return execute_failure(command, ctx, json_mode).await,
    }

    Ok(())
}

async fn execute_failure(command: FailureCommands, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let log = ctx.failure_log().await?;
    match command {
        FailureCommands::Record {
            category,
            detail,
            file,
        } => {
            let id = log.record_failure(&category, file.as_deref(), &detail).await?;
            output(&MessageOutput::ok(format!("Recorded failure {id}")), json_mode);
        }
        FailureCommands::Count {
            category,
            since_days,
            file,
        } => {
            let query = FailureQuery {
                category,
                since: since_days.map(|days| Utc::now() - Duration::days(days)),
                file_path: file,
            };
            let count = log.count_failures(&query).await?;
            output(&FailureCountOutput { count }, json_mode);
        }
    }
    Ok(())
}
