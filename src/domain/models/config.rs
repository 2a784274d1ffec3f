use serde::{Deserialize, Serialize};

use super::delivery_state::{DeliveryPhase, OrchestrationMode};
use super::spec_state::SpecVariant;

/// Main configuration structure for Waypoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Directory holding one sub-directory of workflow state per session
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Spec workflow configuration
    #[serde(default)]
    pub spec: SpecConfig,

    /// Delivery workflow configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Pattern learning configuration
    #[serde(default)]
    pub learning: LearningConfig,
}

fn default_state_dir() -> String {
    ".waypoint/sessions".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            spec: SpecConfig::default(),
            delivery: DeliveryConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".waypoint/waypoint.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation policy for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Spec workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SpecConfig {
    /// Legality table: standard (4 phases) or extended (8 phases)
    #[serde(default)]
    pub variant: SpecVariant,

    /// Review fix loops allowed per workflow
    #[serde(default = "default_max_review_iterations")]
    pub max_review_iterations: u32,

    /// Reject `start_fix_loop` past the bound instead of leaving it to the caller
    #[serde(default = "default_true")]
    pub enforce_fix_loop_bound: bool,
}

const fn default_max_review_iterations() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            variant: SpecVariant::default(),
            max_review_iterations: default_max_review_iterations(),
            enforce_fix_loop_bound: default_true(),
        }
    }
}

/// Delivery workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeliveryConfig {
    /// Mode used when `start` is not given one
    #[serde(default)]
    pub default_mode: OrchestrationMode,

    /// Explicit active phase subset; overrides the mode default
    #[serde(default)]
    pub active_phases: Option<Vec<DeliveryPhase>>,

    /// Fix loops allowed per delivery
    #[serde(default = "default_max_review_iterations")]
    pub max_review_iterations: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_mode: OrchestrationMode::default(),
            active_phases: None,
            max_review_iterations: default_max_review_iterations(),
        }
    }
}

/// Pattern learning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LearningConfig {
    /// Days a rejected or ignored pattern stays suppressed
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,

    /// Proposals emitted per session at most
    #[serde(default = "default_max_proposals")]
    pub max_proposals_per_session: usize,

    /// Keyword overlap above which an existing rule counts as a duplicate
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Decisions needed for a type before history adjusts confidence
    #[serde(default = "default_min_decisions_for_prior")]
    pub min_decisions_for_prior: u32,

    /// Window for the failure baseline taken at rule acceptance
    #[serde(default = "default_baseline_window_days")]
    pub baseline_window_days: u32,

    /// Where accepted rules are written
    #[serde(default = "default_rules_dir")]
    pub rules_dir: String,
}

const fn default_cooldown_days() -> u32 {
    7
}

const fn default_max_proposals() -> usize {
    3
}

const fn default_similarity_threshold() -> f64 {
    0.5
}

const fn default_min_decisions_for_prior() -> u32 {
    5
}

const fn default_baseline_window_days() -> u32 {
    30
}

fn default_rules_dir() -> String {
    ".claude/rules".to_string()
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            cooldown_days: default_cooldown_days(),
            max_proposals_per_session: default_max_proposals(),
            similarity_threshold: default_similarity_threshold(),
            min_decisions_for_prior: default_min_decisions_for_prior(),
            baseline_window_days: default_baseline_window_days(),
            rules_dir: default_rules_dir(),
        }
    }
}
