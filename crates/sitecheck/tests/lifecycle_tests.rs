//! End-to-end lifecycle tests: uploads feed the gate, transitions write
//! the ledger, and resets wipe the job's history.

mod common;

use std::collections::BTreeSet;
use std::time::Duration as StdDuration;

use chrono::Duration;

use common::*;
use sitecheck::catalog::{bedroom_key, BASE_COMPARE};
use sitecheck::categories::{derive_categories, required_keys, CategoryGroup};
use sitecheck::gate::GateBlock;
use sitecheck::{
    can_transition, ActivityEntry, AttributeUpdate, FeatureCatalog, FeatureSet, JobStatus,
    Persistence, Phase, TransitionError, UnitType,
};

fn features(keys: &[&str]) -> FeatureSet {
    keys.iter().map(|k| k.to_string()).collect()
}

// ============================================================================
// Category derivation
// ============================================================================

#[test]
fn test_derivation_is_deterministic() {
    let catalog = FeatureCatalog::default();
    let set = features(&["laundry", "balcony", "dishwasher"]);
    for unit_type in UnitType::ALL {
        for phase in [Phase::Before, Phase::After] {
            let first = required_keys(&catalog, Some(unit_type), &set, phase);
            let second = required_keys(&catalog, Some(unit_type), &set, phase);
            assert_eq!(first, second);
        }
    }
}

#[test]
fn test_adding_a_feature_only_adds_categories() {
    let catalog = FeatureCatalog::default();
    let without = required_keys(&catalog, Some(UnitType::OneBed), &features(&[]), Phase::After);
    for feature in catalog.features() {
        let with = required_keys(
            &catalog,
            Some(UnitType::OneBed),
            &features(&[feature.key.as_str()]),
            Phase::After,
        );
        for key in &without {
            assert!(with.contains(key), "{} dropped {}", feature.key, key);
        }
    }
}

#[test]
fn test_bedroom_categories_scale_with_unit_type() {
    let catalog = FeatureCatalog::default();
    for unit_type in UnitType::ALL {
        let keys = required_keys(&catalog, Some(unit_type), &features(&[]), Phase::After);
        let bedrooms: Vec<_> = keys.iter().filter(|k| k.starts_with("bedroom_")).collect();
        assert_eq!(bedrooms.len(), unit_type.bedroom_count() as usize);
        for index in 1..=unit_type.bedroom_count() {
            assert!(keys.contains(&bedroom_key(index)));
        }
    }
}

#[test]
fn test_two_bedroom_with_laundry_and_balcony() {
    let catalog = FeatureCatalog::default();
    let set = features(&["laundry", "balcony"]);

    let before = required_keys(&catalog, Some(UnitType::TwoBeds), &set, Phase::Before);
    let mut expected_before = base_keys();
    expected_before.push("ac_unit".to_string());
    assert_eq!(before, expected_before);

    let general: Vec<String> =
        derive_categories(&catalog, Some(UnitType::TwoBeds), &set, Phase::After)
            .into_iter()
            .filter(|c| c.group == CategoryGroup::General)
            .map(|c| c.key)
            .collect();
    assert_eq!(
        general,
        vec![
            "kitchen",
            "bathroom",
            "living_room",
            "laundry_unit",
            "balcony_area",
            "bedroom_1",
            "bedroom_2"
        ]
    );
}

#[test]
fn test_gate_closes_over_required_categories() {
    let catalog = FeatureCatalog::default();
    let harness = TestHarness::new();
    let job = harness.register(draft_with("j1", UnitType::ThreeBeds, &["laundry", "microwave"]));
    let required = required_keys(&catalog, job.unit_type, &job.features, Phase::After);

    let all: BTreeSet<String> = required.iter().cloned().collect();
    assert!(can_transition(&catalog, &job, Phase::After, &all).is_allowed());

    for dropped in &required {
        let mut captured = all.clone();
        captured.remove(dropped);
        let decision = can_transition(&catalog, &job, Phase::After, &captured);
        assert!(!decision.allowed);
        assert_eq!(decision.missing, vec![dropped.clone()]);
    }
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_unset_unit_type_blocks_start() {
    let h = TestHarness::new();
    h.register(draft("j1"));
    h.capture("j1", Phase::Before, &base_keys()).await;

    let err = h
        .lifecycle
        .start(&h.worker(), "j1", AttributeUpdate::none())
        .await
        .unwrap_err();
    match err {
        TransitionError::Rejected(decision) => {
            assert!(decision.missing.is_empty());
            assert_eq!(decision.blocked_by, Some(GateBlock::UnitTypeUnset));
        }
        other => panic!("Expected rejection, got {:?}", other),
    }
    assert_eq!(h.lifecycle.get_job("j1").unwrap().status, JobStatus::Pending);

    // Supplying the unit type with the start request unblocks it.
    let job = h
        .lifecycle
        .start(
            &h.worker(),
            "j1",
            AttributeUpdate::none().unit_type(UnitType::Bachelor),
        )
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.unit_type, Some(UnitType::Bachelor));
}

#[tokio::test]
async fn test_start_and_complete_after_uploads() {
    let h = TestHarness::new();
    h.register(draft_with("j1", UnitType::TwoBeds, &["laundry", "balcony"]));

    let mut before = base_keys();
    before.push("ac_unit".to_string());
    h.capture("j1", Phase::Before, &before[..before.len() - 1]).await;

    let err = h
        .lifecycle
        .start(&h.worker(), "j1", AttributeUpdate::none())
        .await
        .unwrap_err();
    assert_eq!(err.missing_categories(), Some(&["ac_unit".to_string()][..]));

    h.capture("j1", Phase::Before, &before[before.len() - 1..]).await;
    h.start("j1").await;

    h.clock.advance(Duration::seconds(1500));

    // Before photos do not count toward the completion gate.
    let readiness = h.lifecycle.readiness("j1", Phase::After).unwrap();
    assert!(readiness.missing.starts_with(&before));

    let mut after = before.clone();
    after.extend(["kitchen", "bathroom", "living_room"].map(String::from));
    after.extend(["laundry_unit", "balcony_area", "bedroom_1", "bedroom_2"].map(String::from));
    h.capture("j1", Phase::After, &after).await;

    let job = h.lifecycle.complete(&h.worker(), "j1").await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.duration_minutes, Some(25));
    assert_eq!(h.activity_count("j1"), 2);
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let h = TestHarness::new();
    h.register(draft_with("j1", UnitType::Studio, &[]));
    h.capture("j1", Phase::Before, &base_keys()).await;
    h.start("j1").await;

    let mut after = base_keys();
    after.extend(general_keys(0));
    h.capture("j1", Phase::After, &after).await;

    h.clock.advance(Duration::minutes(40));
    let first = h.lifecycle.complete(&h.worker(), "j1").await.unwrap();
    h.clock.advance(Duration::minutes(5));
    let second = h.lifecycle.complete(&h.worker(), "j1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.duration_minutes, Some(40));
    let entries = h.store.read_activities("j1").unwrap();
    let stops = entries
        .iter()
        .filter(|e| e.action == sitecheck::ActivityAction::Stop)
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_completes_write_one_stop() {
    let h = TestHarness::with_delays(StdDuration::from_millis(100), StdDuration::ZERO);
    h.register(draft_with("j1", UnitType::Studio, &[]));
    h.capture("j1", Phase::Before, &base_keys()).await;
    h.start("j1").await;
    let mut after = base_keys();
    after.extend(general_keys(0));
    h.capture("j1", Phase::After, &after).await;
    h.clock.advance(Duration::minutes(10));

    // Both calls sit in the slow read at the same time unless the job lock
    // serializes them.
    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let lifecycle = h.lifecycle.clone();
            let worker = h.worker();
            tokio::spawn(async move { lifecycle.complete(&worker, "j1").await })
        })
        .collect();
    for task in tasks {
        let job = task.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    let activities = h.store.read_activities("j1").unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities.iter().filter(|a| a.action == sitecheck::ActivityAction::Stop).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_starts_write_one_start() {
    let h = TestHarness::with_delays(StdDuration::from_millis(100), StdDuration::ZERO);
    h.register(draft_with("j1", UnitType::Studio, &[]));
    h.capture("j1", Phase::Before, &base_keys()).await;

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let lifecycle = h.lifecycle.clone();
            let worker = h.worker();
            tokio::spawn(async move {
                lifecycle
                    .start(&worker, "j1", AttributeUpdate::none())
                    .await
            })
        })
        .collect();
    for task in tasks {
        let job = task.await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
    }

    assert_eq!(h.activity_count("j1"), 1);
}

#[tokio::test]
async fn test_reset_wipes_history() {
    let h = TestHarness::new();
    h.register(draft_with("j1", UnitType::Studio, &[]));

    let keys: Vec<String> = BASE_COMPARE.iter().take(3).map(|(k, _)| k.to_string()).collect();
    h.capture("j1", Phase::Before, &keys).await;
    h.capture("j1", Phase::Before, &keys[..2]).await;
    assert_eq!(h.photo_count("j1"), 5);

    h.store.append_activity(&ActivityEntry::start("j1", t0())).unwrap();
    h.store
        .append_activity(&ActivityEntry::stop("j1", t0() + Duration::minutes(3)))
        .unwrap();
    assert_eq!(h.activity_count("j1"), 2);

    let job = h.lifecycle.reset(&h.admin(), "j1").unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.started_at, None);
    assert_eq!(job.completed_at, None);
    assert_eq!(job.duration_minutes, None);
    assert_eq!(h.photo_count("j1"), 0);
    assert_eq!(h.activity_count("j1"), 0);
    assert_eq!(h.lifecycle.elapsed_seconds("j1").unwrap(), 0);

    // Attributes and assignment survive a reset.
    assert_eq!(job.unit_type, Some(UnitType::Studio));
    assert_eq!(job.assigned_worker.as_deref(), Some(WORKER));
}

#[tokio::test]
async fn test_reset_after_completion_clears_duration() {
    let h = TestHarness::new();
    h.register(draft_with("j1", UnitType::Studio, &[]));
    h.capture("j1", Phase::Before, &base_keys()).await;
    h.start("j1").await;
    let mut after = base_keys();
    after.extend(general_keys(0));
    h.capture("j1", Phase::After, &after).await;
    h.clock.advance(Duration::minutes(12));
    h.lifecycle.complete(&h.worker(), "j1").await.unwrap();

    let job = h.lifecycle.reset(&h.admin(), "j1").unwrap();
    assert_eq!(job.duration_minutes, None);

    let report = h.lifecycle.report("j1").unwrap();
    assert_eq!(report.status, JobStatus::Pending);
    assert!(report.photo_counts.is_empty());
}

#[tokio::test]
async fn test_worker_cannot_reset() {
    let h = TestHarness::new();
    h.register(draft_with("j1", UnitType::Studio, &[]));
    let err = h.lifecycle.reset(&h.worker(), "j1").unwrap_err();
    assert!(matches!(err, TransitionError::Forbidden { .. }));
}
