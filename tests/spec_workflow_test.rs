//! End-to-end tests for the spec workflow coordinator.

mod common;

use std::sync::Arc;

use waypoint::adapters::sqlite::SqliteFailureLog;
use waypoint::adapters::{FileStateStore, InMemoryStateStore};
use waypoint::domain::models::{
    Finding, PlanStatus, ReviewVerdict, SessionId, Severity, SpecConfig, SpecPhase, SpecVariant, Verdict,
};
use waypoint::domain::ports::{FailureLog, FailureQuery};
use waypoint::services::{parse_verdict, SpecCoordinator};
use waypoint::DomainError;

fn coordinator(config: SpecConfig) -> SpecCoordinator {
    SpecCoordinator::new(Arc::new(InMemoryStateStore::new()), SessionId::new("e2e"), config)
}

fn failing_verdict(reviewer: &str) -> ReviewVerdict {
    ReviewVerdict {
        reviewer: reviewer.to_string(),
        verdict: Verdict::Fail,
        findings: vec![Finding {
            file_path: Some("src/lib.rs".to_string()),
            line: Some(12),
            severity: Severity::MustFix,
            description: "unchecked index".to_string(),
        }],
        raw_output: String::new(),
    }
}

fn passing_verdict(reviewer: &str) -> ReviewVerdict {
    ReviewVerdict {
        reviewer: reviewer.to_string(),
        verdict: Verdict::Pass,
        findings: Vec::new(),
        raw_output: String::new(),
    }
}

#[tokio::test]
async fn test_plan_to_fix_loop_scenario() {
    let spec = coordinator(SpecConfig::default());

    let state = spec.start("feat-1", None).await.unwrap();
    assert_eq!(state.phase, SpecPhase::Plan);
    assert_eq!(state.plan_status, PlanStatus::Draft);

    let state = spec.approve_plan(3).await.unwrap();
    assert_eq!(state.phase, SpecPhase::Implement);
    assert_eq!(state.total_tasks, 3);
    assert_eq!(state.current_task, 1);

    for n in 1..=3 {
        spec.complete_task(n).await.unwrap();
    }
    assert!(spec.all_tasks_done().await.unwrap());

    let state = spec.start_verify().await.unwrap();
    assert_eq!(state.phase, SpecPhase::Verify);

    let aggregate = spec.record_verdicts(&[failing_verdict("r1")]).await.unwrap();
    assert!(!aggregate.all_passed);
    assert_eq!(aggregate.must_fix_count, 1);
    assert_eq!(aggregate.failed_reviewers, vec!["r1".to_string()]);
    assert!(spec.needs_fix_loop().await.unwrap());

    let state = spec.start_fix_loop().await.unwrap();
    assert_eq!(state.phase, SpecPhase::Implement);
    assert_eq!(state.review_iteration, 1);
}

#[tokio::test]
async fn test_passing_review_runs_to_completion() {
    let spec = coordinator(SpecConfig::default());
    spec.start("feat-2", Some("plans/feat-2.md".to_string())).await.unwrap();
    spec.approve_plan(1).await.unwrap();
    spec.complete_task(1).await.unwrap();
    spec.start_verify().await.unwrap();

    let aggregate = spec
        .record_verdicts(&[passing_verdict("r1"), passing_verdict("r2")])
        .await
        .unwrap();
    assert!(aggregate.all_passed);
    assert!(!spec.needs_fix_loop().await.unwrap());

    spec.start_learn().await.unwrap();
    let state = spec.complete_spec().await.unwrap();
    assert_eq!(state.phase, SpecPhase::Learn);
    assert_eq!(state.plan_status, PlanStatus::Complete);

    // A finished workflow can be replaced by a new one.
    let next = spec.start("feat-3", None).await.unwrap();
    assert_eq!(next.slug, "feat-3");
}

#[tokio::test]
async fn test_illegal_jumps_are_refused_and_state_is_unchanged() {
    let spec = coordinator(SpecConfig::default());
    spec.start("feat-1", None).await.unwrap();

    let err = spec.transition(SpecPhase::Verify).await.unwrap_err();
    match err {
        DomainError::InvalidTransition { from, to, legal, .. } => {
            assert_eq!(from, "plan");
            assert_eq!(to, "verify");
            assert_eq!(legal, vec!["implement".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(spec.state().await.unwrap().phase, SpecPhase::Plan);

    assert!(matches!(
        spec.complete_spec().await,
        Err(DomainError::InvalidTransition { .. })
    ));
    assert!(matches!(
        spec.start_fix_loop().await,
        Err(DomainError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_second_start_is_refused_while_active() {
    let spec = coordinator(SpecConfig::default());
    spec.start("feat-1", None).await.unwrap();

    let err = spec.start("feat-2", None).await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyActive { ref slug, .. } if slug == "feat-1"));
    assert_eq!(spec.state().await.unwrap().slug, "feat-1");
}

#[tokio::test]
async fn test_operations_without_a_workflow_report_no_active_workflow() {
    let spec = coordinator(SpecConfig::default());
    assert!(matches!(spec.state().await, Err(DomainError::NoActiveWorkflow(_))));
    assert!(matches!(spec.approve_plan(2).await, Err(DomainError::NoActiveWorkflow(_))));
    assert!(matches!(spec.needs_fix_loop().await, Err(DomainError::NoActiveWorkflow(_))));
}

#[tokio::test]
async fn test_fix_loop_bound_is_enforced() {
    let spec = coordinator(SpecConfig {
        max_review_iterations: 2,
        ..SpecConfig::default()
    });
    spec.start("feat-1", None).await.unwrap();
    spec.approve_plan(1).await.unwrap();

    for iteration in 1..=2 {
        spec.start_verify().await.unwrap();
        spec.record_verdicts(&[failing_verdict("r1")]).await.unwrap();
        assert!(spec.needs_fix_loop().await.unwrap());
        let state = spec.start_fix_loop().await.unwrap();
        assert_eq!(state.review_iteration, iteration);
    }

    spec.start_verify().await.unwrap();
    spec.record_verdicts(&[failing_verdict("r1")]).await.unwrap();
    assert!(!spec.needs_fix_loop().await.unwrap());
    let err = spec.start_fix_loop().await.unwrap_err();
    assert!(matches!(err, DomainError::MaxIterationsExceeded { iteration: 2, max: 2 }));
    assert_eq!(spec.state().await.unwrap().phase, SpecPhase::Verify);
}

#[tokio::test]
async fn test_unenforced_bound_allows_extra_fix_loops() {
    let spec = coordinator(SpecConfig {
        max_review_iterations: 1,
        enforce_fix_loop_bound: false,
        ..SpecConfig::default()
    });
    spec.start("feat-1", None).await.unwrap();
    spec.approve_plan(1).await.unwrap();

    for _ in 0..3 {
        spec.start_verify().await.unwrap();
        spec.start_fix_loop().await.unwrap();
    }
    assert_eq!(spec.state().await.unwrap().review_iteration, 3);
}

#[tokio::test]
async fn test_extended_variant_walks_governance_and_accept() {
    let spec = coordinator(SpecConfig {
        variant: SpecVariant::Extended,
        ..SpecConfig::default()
    });

    let state = spec.start("feat-x", None).await.unwrap();
    assert_eq!(state.phase, SpecPhase::Discovery);

    spec.transition(SpecPhase::Design).await.unwrap();
    spec.transition(SpecPhase::Plan).await.unwrap();
    spec.approve_plan(2).await.unwrap();
    spec.start_verify().await.unwrap();

    // Learn is not reachable from verify in the extended table.
    assert!(matches!(
        spec.start_learn().await,
        Err(DomainError::InvalidTransition { .. })
    ));

    spec.transition(SpecPhase::Governance).await.unwrap();
    let state = spec.transition(SpecPhase::Implement).await.unwrap();
    assert_eq!(state.review_iteration, 1, "governance back to implement is a fix loop");

    spec.start_verify().await.unwrap();
    spec.transition(SpecPhase::Governance).await.unwrap();
    spec.transition(SpecPhase::Accept).await.unwrap();
    spec.start_learn().await.unwrap();
    let state = spec.complete_spec().await.unwrap();
    assert_eq!(state.plan_status, PlanStatus::Complete);
}

#[tokio::test]
async fn test_task_counters_never_exceed_total() {
    let spec = coordinator(SpecConfig::default());
    spec.start("feat-1", None).await.unwrap();
    spec.approve_plan(2).await.unwrap();

    for n in [1, 2, 2, 5] {
        spec.complete_task(n).await.unwrap();
    }
    let state = spec.start_task(9).await.unwrap();
    assert_eq!(state.completed_tasks, 2);
    assert_eq!(state.current_task, 2);
    assert!(spec.all_tasks_done().await.unwrap());
}

#[tokio::test]
async fn test_state_survives_a_new_coordinator_over_the_same_directory() {
    let dir = common::temp_dir();
    let session = SessionId::new("persisted");

    let first = SpecCoordinator::new(
        Arc::new(FileStateStore::new(dir.path())),
        session.clone(),
        SpecConfig::default(),
    );
    first.start("feat-1", None).await.unwrap();
    first.approve_plan(4).await.unwrap();
    first.complete_task(1).await.unwrap();

    let second = SpecCoordinator::new(
        Arc::new(FileStateStore::new(dir.path())),
        session,
        SpecConfig::default(),
    );
    let state = second.state().await.unwrap();
    assert_eq!(state.phase, SpecPhase::Implement);
    assert_eq!(state.completed_tasks, 1);
    assert_eq!(state.total_tasks, 4);
}

#[tokio::test]
async fn test_failing_reviewers_are_reported_to_the_failure_log() {
    let pool = common::migrated_pool().await;
    let failure_log = Arc::new(SqliteFailureLog::new(pool));
    let spec = coordinator(SpecConfig::default()).with_failure_log(failure_log.clone());

    spec.start("feat-1", None).await.unwrap();
    spec.approve_plan(1).await.unwrap();
    spec.start_verify().await.unwrap();

    let raw = "Review done.\nVERDICT: FAIL\n- MUST_FIX: src/auth.rs:10 - token logged\n";
    spec.record_verdicts(&[parse_verdict(raw, "security"), passing_verdict("style")])
        .await
        .unwrap();

    let count = failure_log
        .count_failures(&FailureQuery::category("review"))
        .await
        .unwrap();
    assert_eq!(count, 1);
}
