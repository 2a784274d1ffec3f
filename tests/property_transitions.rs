use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use waypoint::adapters::InMemoryStateStore;
use waypoint::domain::models::{
    DeliveryPhase, SessionId, SpecConfig, SpecPhase, SpecVariant, ALL_PHASES,
};
use waypoint::services::delivery_coordinator::next_active_phase;
use waypoint::services::{score_effectiveness, SpecCoordinator};

const SPEC_PHASES: [SpecPhase; 8] = [
    SpecPhase::Discovery,
    SpecPhase::Design,
    SpecPhase::Plan,
    SpecPhase::Implement,
    SpecPhase::Verify,
    SpecPhase::Governance,
    SpecPhase::Accept,
    SpecPhase::Learn,
];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Every active phase reachable through inactive phases only; the
/// earliest one wins.
fn brute_force_next(from: DeliveryPhase, active: &[DeliveryPhase]) -> Option<DeliveryPhase> {
    let mut stack: Vec<DeliveryPhase> = from.forward_successors().collect();
    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    while let Some(phase) = stack.pop() {
        if !seen.insert(phase) {
            continue;
        }
        if active.contains(&phase) {
            hits.push(phase);
        } else {
            stack.extend(phase.forward_successors());
        }
    }
    hits.into_iter().min()
}

proptest! {
    /// Property: the skip walk lands on the earliest active phase reachable
    /// without passing through another active phase.
    #[test]
    fn prop_next_active_phase_matches_exhaustive_search(
        from in proptest::sample::select(ALL_PHASES.to_vec()),
        active in proptest::sample::subsequence(ALL_PHASES.to_vec(), 0..=9),
    ) {
        let next = next_active_phase(from, &active);
        prop_assert_eq!(next, brute_force_next(from, &active));
        if let Some(next) = next {
            prop_assert!(next > from);
            prop_assert!(active.contains(&next));
        }
    }

    /// Property: a spec transition succeeds exactly when the variant's table
    /// allows it, and a refused one leaves the phase untouched.
    #[test]
    fn prop_spec_transitions_follow_the_table(
        extended in any::<bool>(),
        targets in proptest::collection::vec(proptest::sample::select(SPEC_PHASES.to_vec()), 1..16),
    ) {
        let variant = if extended { SpecVariant::Extended } else { SpecVariant::Standard };
        let config = SpecConfig {
            variant,
            enforce_fix_loop_bound: false,
            ..SpecConfig::default()
        };
        let spec = SpecCoordinator::new(Arc::new(InMemoryStateStore::new()), SessionId::new("p"), config);

        runtime().block_on(async {
            spec.start("prop", None).await.unwrap();
            for target in targets {
                let before = spec.state().await.unwrap();
                let fix_loop = target == SpecPhase::Implement
                    && matches!(before.phase, SpecPhase::Verify | SpecPhase::Governance);
                let result = spec.transition(target).await;

                if fix_loop || variant.can_transition(before.phase, target) {
                    let after = result.unwrap();
                    prop_assert_eq!(after.phase, target);
                    let expected_iteration = before.review_iteration + u32::from(fix_loop);
                    prop_assert_eq!(after.review_iteration, expected_iteration);
                } else {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(spec.state().await.unwrap().phase, before.phase);
                }
                prop_assert!(variant.phases().contains(&spec.state().await.unwrap().phase));
            }
            Ok(())
        })?;
    }

    /// Property: task counters stay within the plan whatever order tasks
    /// are reported in.
    #[test]
    fn prop_task_counters_stay_within_plan(
        total in 0u32..8,
        ops in proptest::collection::vec(
            (any::<bool>(), prop_oneof![0u32..12, any::<u32>()]),
            0..24,
        ),
    ) {
        let spec = SpecCoordinator::new(
            Arc::new(InMemoryStateStore::new()),
            SessionId::new("p"),
            SpecConfig::default(),
        );

        runtime().block_on(async {
            spec.start("prop", None).await.unwrap();
            spec.approve_plan(total).await.unwrap();
            for (complete, n) in ops {
                let state = if complete {
                    spec.complete_task(n).await.unwrap()
                } else {
                    spec.start_task(n).await.unwrap()
                };
                prop_assert!(state.completed_tasks <= state.total_tasks);
                prop_assert!(state.current_task <= state.total_tasks.max(1));
            }
            Ok(())
        })?;
    }

    /// Property: more failures since acceptance never make a rule look
    /// more effective, and the score stays in [0, 1].
    #[test]
    fn prop_effectiveness_is_monotonic_in_current_failures(
        baseline in 0u64..200,
        window in 1u32..90,
        current in 0u64..200,
        days in 0i64..120,
    ) {
        let fewer = score_effectiveness(baseline, window, current, days);
        let more = score_effectiveness(baseline, window, current + 1, days);
        prop_assert!((0.0..=1.0).contains(&fewer.score));
        prop_assert!(more.score <= fewer.score);
    }
}
