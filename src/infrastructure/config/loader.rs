use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("State directory cannot be empty")]
    EmptyStateDir,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_review_iterations for {0}: must be at least 1")]
    InvalidIterationBound(&'static str),

    #[error("Invalid max_proposals_per_session: must be at least 1")]
    InvalidProposalCap,

    #[error("Invalid similarity_threshold: {0}. Must be in (0, 1]")]
    InvalidSimilarityThreshold(f64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the working directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .waypoint/config.yaml
    /// 3. .waypoint/local.yaml (optional, untracked overrides)
    /// 4. Environment variables (WAYPOINT_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration for the project rooted at `project_root`.
    pub fn load_from(project_root: &Path) -> Result<Config> {
        let dir = project_root.join(".waypoint");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("WAYPOINT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.state_dir.is_empty() {
            return Err(ConfigError::EmptyStateDir);
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.spec.max_review_iterations == 0 {
            return Err(ConfigError::InvalidIterationBound("spec"));
        }
        if config.delivery.max_review_iterations == 0 {
            return Err(ConfigError::InvalidIterationBound("delivery"));
        }
        if let Some(phases) = &config.delivery.active_phases {
            if phases.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "delivery.active_phases cannot be empty; omit it to use the mode default".to_string(),
                ));
            }
        }

        if config.learning.max_proposals_per_session == 0 {
            return Err(ConfigError::InvalidProposalCap);
        }
        let threshold = config.learning.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidSimilarityThreshold(threshold));
        }
        if config.learning.baseline_window_days == 0 {
            return Err(ConfigError::ValidationFailed(
                "learning.baseline_window_days must be at least 1".to_string(),
            ));
        }
        if config.learning.rules_dir.is_empty() {
            return Err(ConfigError::ValidationFailed("learning.rules_dir cannot be empty".to_string()));
        }

        Ok(())
    }
}
