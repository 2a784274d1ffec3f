//! Common test utilities for integration tests
//!
//! Provides shared fixtures and builders used across multiple integration
//! test files.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use waypoint::adapters::sqlite::{create_migrated_test_pool, SqliteFailureLog, SqliteLearningRepository};
use waypoint::adapters::FsRuleLibrary;
use waypoint::domain::models::{Detection, DetectionType, LearningConfig};
use waypoint::services::LearningService;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory SQLite pool with every migration applied.
pub async fn migrated_pool() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("Failed to create migrated test pool")
}

/// Learning service wired to SQLite and a rules directory inside `project_root`.
pub struct LearningHarness {
    pub service: LearningService,
    pub failure_log: Arc<SqliteFailureLog>,
    pub repo: Arc<SqliteLearningRepository>,
    pub pool: SqlitePool,
}

pub async fn learning_harness(project_root: &Path, config: LearningConfig) -> LearningHarness {
    let pool = migrated_pool().await;
    let repo = Arc::new(SqliteLearningRepository::new(pool.clone()));
    let failure_log = Arc::new(SqliteFailureLog::new(pool.clone()));
    let rules = Arc::new(FsRuleLibrary::new(project_root.join(&config.rules_dir)));
    let service = LearningService::new(
        repo.clone(),
        failure_log.clone(),
        rules.clone(),
        rules,
        config,
        project_root,
    );
    LearningHarness {
        service,
        failure_log,
        repo,
        pool,
    }
}

/// Detection seen in `count` places across the given files.
pub fn detection(detection_type: DetectionType, count: u32, files: &[&str], description: &str) -> Detection {
    Detection {
        detection_type,
        count,
        confidence_raw: 0.0,
        files: files.iter().map(|f| (*f).to_string()).collect::<BTreeSet<_>>(),
        description: description.to_string(),
        instances: Vec::new(),
    }
}

/// Setup a test git repository
///
/// Creates a temporary directory with an initialized git repository
/// containing one commit on `main`.
pub fn setup_test_git_repo() -> TempDir {
    let dir = temp_dir();
    let path = dir.path();

    run_git(path, &["init", "-b", "main"]);
    run_git(path, &["config", "user.email", "test@example.com"]);
    run_git(path, &["config", "user.name", "Test User"]);
    std::fs::write(path.join("README.md"), "# test\n").expect("Failed to write README");
    run_git(path, &["add", "README.md"]);
    run_git(path, &["commit", "-m", "Initial commit"]);

    dir
}

/// True when a usable `git` binary is on the PATH.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}
