//! Spec workflow CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::cli::context::AppContext;
use crate::cli::output::{output, AnswerOutput, CommandOutput, MessageOutput};
use crate::domain::models::{ReviewAggregate, ReviewVerdict, SpecPhase, SpecState, SpecVariant};
use crate::domain::ports::{WorktreeCleanup, WorktreeSync};
use crate::services::{build_fix_instructions, parse_verdict};

#[derive(Args, Debug)]
pub struct SpecArgs {
    #[command(subcommand)]
    pub command: SpecCommands,
}

#[derive(Subcommand, Debug)]
pub enum SpecCommands {
    /// Start a spec workflow
    Start {
        /// Feature slug
        slug: String,
        /// Path to the plan document
        #[arg(short, long)]
        plan: Option<String>,
        /// Phase table: standard or extended (overrides config)
        #[arg(long)]
        variant: Option<String>,
    },
    /// Show the current spec state
    Status,
    /// Move to a named phase
    Transition {
        /// Target phase
        phase: String,
    },
    /// Approve the plan and enter implement
    ApprovePlan {
        /// Number of tasks in the plan
        #[arg(short, long)]
        tasks: u32,
    },
    /// Mark a task as started
    StartTask {
        /// Task number (1-based)
        n: u32,
    },
    /// Mark a task as completed
    CompleteTask {
        /// Task number (1-based)
        n: u32,
    },
    /// Report whether every task is completed
    TasksDone,
    /// Enter verify
    Verify,
    /// Record reviewer verdicts from files (JSON verdicts or raw reviewer output)
    RecordVerdicts {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Report whether the last review requires a fix loop
    NeedsFixLoop,
    /// Go back to implement to address review findings
    FixLoop,
    /// Print fix instructions grouped by file
    FixInstructions {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Enter learn
    Learn,
    /// Complete the workflow
    Complete,
    /// Worktree management
    #[command(subcommand)]
    Worktree(SpecWorktreeCommands),
}

#[derive(Subcommand, Debug)]
pub enum SpecWorktreeCommands {
    /// Create a worktree for the workflow's branch
    Attach {
        /// Base branch to fork from and merge into
        #[arg(short, long, default_value = "main")]
        base: String,
    },
    /// Merge the worktree branch into its base
    Sync,
    /// Remove the worktree and its merged branch
    Cleanup,
}

#[derive(Debug, serde::Serialize)]
pub struct SpecStateOutput {
    pub state: SpecState,
}

impl CommandOutput for SpecStateOutput {
    fn to_human(&self) -> String {
        let s = &self.state;
        let mut lines = vec![
            format!("Spec: {}", s.slug),
            format!("Phase: {} ({})", s.phase, s.variant.as_str()),
            format!("Plan: {} [{}]", s.plan_path.as_deref().unwrap_or("-"), s.plan_status.as_str()),
            format!(
                "Tasks: {}/{} completed, current {}",
                s.completed_tasks, s.total_tasks, s.current_task
            ),
            format!("Review iteration: {}/{}", s.review_iteration, s.max_review_iterations),
        ];
        if let Some(review) = &s.last_review {
            lines.push(format!(
                "Last review: {} ({} must-fix, {} should-fix)",
                if review.all_passed { "passed" } else { "failed" },
                review.must_fix_count,
                review.should_fix_count
            ));
        }
        if let Some(wt) = &s.worktree {
            lines.push(format!("Worktree: {} ({})", wt.path, wt.branch));
        }
        lines.push(format!("Updated: {}", s.last_updated.to_rfc3339()));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReviewOutput {
    pub aggregate: ReviewAggregate,
}

impl CommandOutput for ReviewOutput {
    fn to_human(&self) -> String {
        let a = &self.aggregate;
        let mut lines = vec![format!(
            "Review {}: {} reviewer(s), {} finding(s)",
            if a.all_passed { "passed" } else { "failed" },
            a.reviewer_count,
            a.total_findings
        )];
        lines.push(format!(
            "  must-fix: {}  should-fix: {}  suggestion: {}",
            a.must_fix_count, a.should_fix_count, a.suggestion_count
        ));
        if !a.failed_reviewers.is_empty() {
            lines.push(format!("  failed: {}", a.failed_reviewers.join(", ")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.aggregate).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WorktreeSyncOutput {
    pub sync: WorktreeSync,
}

impl CommandOutput for WorktreeSyncOutput {
    fn to_human(&self) -> String {
        match &self.sync.commit {
            Some(commit) if self.sync.merged => format!(
                "Merged {} file(s) (+{} -{}) as {}",
                self.sync.files_changed, self.sync.insertions, self.sync.deletions, commit
            ),
            _ => "Nothing to merge.".to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.sync).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct WorktreeCleanupOutput {
    pub cleanup: WorktreeCleanup,
}

impl CommandOutput for WorktreeCleanupOutput {
    fn to_human(&self) -> String {
        format!(
            "Worktree removed: {}, branch deleted: {}",
            self.cleanup.removed, self.cleanup.branch_deleted
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.cleanup).unwrap_or_default()
    }
}

/// A verdict file is either a serialized verdict or raw reviewer output,
/// in which case the file stem names the reviewer.
fn load_verdict(path: &Path) -> Result<ReviewVerdict> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read verdict file {}", path.display()))?;
    if let Ok(verdict) = serde_json::from_str::<ReviewVerdict>(&raw) {
        return Ok(verdict);
    }
    let reviewer = path
        .file_stem()
        .map_or_else(|| "reviewer".to_string(), |s| s.to_string_lossy().into_owned());
    Ok(parse_verdict(&raw, &reviewer))
}

fn load_verdicts(files: &[PathBuf]) -> Result<Vec<ReviewVerdict>> {
    files.iter().map(|f| load_verdict(f)).collect()
}

pub async fn execute(args: SpecArgs, mut ctx: AppContext, json_mode: bool) -> Result<()> {
    if let SpecCommands::Start {
        variant: Some(ref variant),
        ..
    } = args.command
    {
        ctx.config.spec.variant = match variant.to_lowercase().as_str() {
            "standard" => SpecVariant::Standard,
            "extended" => SpecVariant::Extended,
            other => anyhow::bail!("Invalid variant: {other}. Must be one of: standard, extended"),
        };
    }

    let coordinator = ctx.spec_coordinator().await?;

    let state = match args.command {
        SpecCommands::Start { slug, plan, .. } => coordinator.start(&slug, plan).await?,
        SpecCommands::Status => coordinator.state().await?,
        SpecCommands::Transition { phase } => {
            let target = SpecPhase::from_str(&phase)
                .ok_or_else(|| anyhow::anyhow!("Invalid phase: {}", phase))?;
            coordinator.transition(target).await?
        }
        SpecCommands::ApprovePlan { tasks } => coordinator.approve_plan(tasks).await?,
        SpecCommands::StartTask { n } => coordinator.start_task(n).await?,
        SpecCommands::CompleteTask { n } => coordinator.complete_task(n).await?,
        SpecCommands::TasksDone => {
            let done = coordinator.all_tasks_done().await?;
            let out = AnswerOutput {
                value: done,
                message: if done {
                    "All tasks completed.".to_string()
                } else {
                    "Tasks remain.".to_string()
                },
            };
            output(&out, json_mode);
            return Ok(());
        }
        SpecCommands::Verify => coordinator.start_verify().await?,
        SpecCommands::RecordVerdicts { files } => {
            let verdicts = load_verdicts(&files)?;
            let aggregate = coordinator.record_verdicts(&verdicts).await?;
            output(&ReviewOutput { aggregate }, json_mode);
            return Ok(());
        }
        SpecCommands::NeedsFixLoop => {
            let needed = coordinator.needs_fix_loop().await?;
            let out = AnswerOutput {
                value: needed,
                message: if needed {
                    "Fix loop needed.".to_string()
                } else {
                    "No fix loop needed.".to_string()
                },
            };
            output(&out, json_mode);
            return Ok(());
        }
        SpecCommands::FixLoop => coordinator.start_fix_loop().await?,
        SpecCommands::FixInstructions { files } => {
            let verdicts = load_verdicts(&files)?;
            output(&MessageOutput::ok(build_fix_instructions(&verdicts)), json_mode);
            return Ok(());
        }
        SpecCommands::Learn => coordinator.start_learn().await?,
        SpecCommands::Complete => coordinator.complete_spec().await?,
        SpecCommands::Worktree(command) => match command {
            SpecWorktreeCommands::Attach { base } => coordinator.attach_worktree(&ctx.project_root, &base).await?,
            SpecWorktreeCommands::Sync => {
                let sync = coordinator.sync_worktree(&ctx.project_root).await?;
                output(&WorktreeSyncOutput { sync }, json_mode);
                return Ok(());
            }
            SpecWorktreeCommands::Cleanup => {
                let cleanup = coordinator.cleanup_worktree(&ctx.project_root).await?;
                output(&WorktreeCleanupOutput { cleanup }, json_mode);
                return Ok(());
            }
        },
    };

    output(&SpecStateOutput { state }, json_mode);
    Ok(())
}
