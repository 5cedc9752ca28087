// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests of the control loop against a recording backend.
//!
//! The fake cloud removes destroyed workers from the registry immediately but
//! never adds requested ones, so each test controls pool membership itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use poolscale_core::{
    AutoscalerLoop, GrowthDecision, InMemoryPoolRegistry, PoolState, ProvisioningError,
    ProvisioningGateway, ScalingPolicy, UtilizationSource, WorkerHandle, WorkerId, WorkloadKind,
};

struct FakeCloud {
    registry: Arc<InMemoryPoolRegistry>,
    utilization: Mutex<HashMap<WorkerId, f64>>,
    owners: Mutex<HashMap<WorkerId, WorkloadKind>>,
    requested: Mutex<Vec<WorkloadKind>>,
    destroyed: Mutex<Vec<WorkerId>>,
    fail_requests: AtomicUsize,
    fail_destroys: AtomicUsize,
}

impl FakeCloud {
    fn new(registry: Arc<InMemoryPoolRegistry>) -> Self {
        Self {
            registry,
            utilization: Mutex::new(HashMap::new()),
            owners: Mutex::new(HashMap::new()),
            requested: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            fail_requests: AtomicUsize::new(0),
            fail_destroys: AtomicUsize::new(0),
        }
    }

    fn add(&self, kind: &WorkloadKind, id: &str, util: f64, busy: bool) -> WorkerId {
        let id = WorkerId::new(id).unwrap();
        self.registry.add_worker(
            kind,
            WorkerHandle::new(id.clone()).with_active_work(busy),
        );
        self.utilization.lock().unwrap().insert(id.clone(), util);
        self.owners.lock().unwrap().insert(id.clone(), kind.clone());
        id
    }

    fn set_busy(&self, id: &WorkerId, busy: bool) {
        let kind = self.owners.lock().unwrap()[id].clone();
        self.registry.set_active_work(&kind, id, busy).unwrap();
    }

    fn requests_for(&self, kind: &WorkloadKind) -> usize {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .filter(|k| *k == kind)
            .count()
    }

    fn destroyed(&self) -> Vec<WorkerId> {
        self.destroyed.lock().unwrap().clone()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl UtilizationSource for FakeCloud {
    fn hourly_utilization(&self, worker: &WorkerHandle) -> f64 {
        self.utilization
            .lock()
            .unwrap()
            .get(worker.id())
            .copied()
            .unwrap_or(0.0)
    }
}

impl ProvisioningGateway for FakeCloud {
    fn request_worker(&self, kind: &WorkloadKind) -> Result<(), ProvisioningError> {
        if take_failure(&self.fail_requests) {
            return Err(ProvisioningError::ProvisioningFailure {
                kind: kind.clone(),
                reason: "capacity exhausted".to_string(),
            });
        }
        self.requested.lock().unwrap().push(kind.clone());
        Ok(())
    }

    fn destroy_worker(&self, worker: &WorkerHandle) -> Result<(), ProvisioningError> {
        if take_failure(&self.fail_destroys) {
            return Err(ProvisioningError::DestructionFailure {
                worker: worker.id().clone(),
                reason: "worker picked up a task".to_string(),
            });
        }
        let kind = self.owners.lock().unwrap().remove(worker.id());
        if let Some(kind) = kind {
            let _ = self.registry.remove_worker(&kind, worker.id());
        }
        self.destroyed.lock().unwrap().push(worker.id().clone());
        Ok(())
    }
}

fn setup(policy: ScalingPolicy) -> (Arc<InMemoryPoolRegistry>, Arc<FakeCloud>, AutoscalerLoop) {
    let registry = InMemoryPoolRegistry::new_shared();
    let cloud = Arc::new(FakeCloud::new(registry.clone()));
    let autoscaler =
        AutoscalerLoop::new(policy, registry.clone(), cloud.clone(), cloud.clone()).unwrap();
    (registry, cloud, autoscaler)
}

fn kind(name: &str) -> WorkloadKind {
    WorkloadKind::new(name).unwrap()
}

#[test]
fn test_empty_kind_requests_exactly_one_worker() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let encode = kind("encode");
    registry.register_kind(encode.clone());

    let report = autoscaler.tick(1).unwrap();
    let kind_report = report.kind(&encode).unwrap();
    assert_eq!(kind_report.state, PoolState::Empty);
    assert_eq!(kind_report.growth, GrowthDecision::Skipped);
    assert_eq!(kind_report.utilization, None);
    assert_eq!(cloud.requests_for(&encode), 1);
}

#[test]
fn test_singleton_destroyed_after_grace_and_kind_forgotten() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let render = kind("render");
    let vm = cloud.add(&render, "render-1", 0.05, false);

    for fires in 1..30 {
        let report = autoscaler.tick(fires).unwrap();
        assert!(report.destroyed.is_empty(), "destroyed early on tick {}", fires);
        assert_eq!(autoscaler.hit_counters().count(&vm), Some(fires as u32));
    }

    let report = autoscaler.tick(30).unwrap();
    assert_eq!(report.destroyed, vec![vm.clone()]);
    assert_eq!(report.forgotten, vec![render.clone()]);
    assert_eq!(report.kind(&render).unwrap().growth, GrowthDecision::Skipped);
    assert!(!registry.contains(&render));

    let report = autoscaler.tick(31).unwrap();
    assert!(report.kind(&render).is_none());
    assert_eq!(cloud.destroyed(), vec![vm]);
    assert!(autoscaler.hit_counters().is_empty());
}

#[test]
fn test_broken_idle_streak_never_destroys() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let render = kind("render");
    let vm = cloud.add(&render, "render-1", 0.05, false);
    let grace = autoscaler.policy().singleton_grace as u64;

    let mut fires = 0;
    for _ in 0..grace - 1 {
        fires += 1;
        autoscaler.tick(fires).unwrap();
    }

    cloud.set_busy(&vm, true);
    fires += 1;
    autoscaler.tick(fires).unwrap();
    assert_eq!(autoscaler.hit_counters().count(&vm), None);

    cloud.set_busy(&vm, false);
    for _ in 0..grace - 1 {
        fires += 1;
        autoscaler.tick(fires).unwrap();
    }

    assert!(cloud.destroyed().is_empty());
    assert_eq!(autoscaler.hit_counters().count(&vm), Some(grace as u32 - 1));
}

#[test]
fn test_thresholds_are_strict() {
    // Low threshold exactly: no request.
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let batch = kind("batch");
    cloud.add(&batch, "batch-1", 0.7, true);

    let report = autoscaler.tick(1).unwrap();
    assert_eq!(report.kind(&batch).unwrap().growth, GrowthDecision::Hold);
    assert!(report.is_quiet());

    // High threshold exactly: transient worker only, target unchanged.
    let policy = ScalingPolicy {
        low_threshold: 0.5,
        high_threshold: 0.75,
        ..ScalingPolicy::pool_tracking()
    };
    let (_registry, cloud, mut autoscaler) = setup(policy);
    for i in 0..4 {
        cloud.add(&batch, &format!("batch-{}", i), 0.75, true);
    }
    autoscaler.tick(1).unwrap();

    let report = autoscaler.tick(2).unwrap();
    let kind_report = report.kind(&batch).unwrap();
    assert_eq!(kind_report.utilization, Some(0.75));
    assert_eq!(kind_report.growth, GrowthDecision::Transient);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));
    assert_eq!(report.requested_for(&batch), 1);
}

#[test]
fn test_overloaded_pool_at_target_grows_durably() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    for i in 0..3 {
        cloud.add(&batch, &format!("batch-{}", i), 0.9, true);
    }

    let report = autoscaler.tick(1).unwrap();
    assert_eq!(report.requested_for(&batch), 3);

    let report = autoscaler.tick(2).unwrap();
    let kind_report = report.kind(&batch).unwrap();
    assert_eq!(kind_report.state, PoolState::AtTarget);
    assert_eq!(kind_report.growth, GrowthDecision::Durable);
    assert_eq!(kind_report.target, Some(4));
    assert_eq!(report.requested_for(&batch), 1);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(4));
}

#[test]
fn test_busy_pool_gets_transient_worker() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    for i in 0..3 {
        cloud.add(&batch, &format!("batch-{}", i), 0.72, false);
    }
    autoscaler.tick(1).unwrap();

    let report = autoscaler.tick(2).unwrap();
    assert_eq!(report.kind(&batch).unwrap().growth, GrowthDecision::Transient);
    assert_eq!(report.requested_for(&batch), 1);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));
}

#[test]
fn test_stable_pools_converge_to_quiet_ticks() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    let render = kind("render");
    for i in 0..3 {
        cloud.add(&batch, &format!("batch-{}", i), 0.4, true);
    }
    cloud.add(&render, "render-1", 0.3, true);
    cloud.add(&render, "render-2", 0.3, false);

    autoscaler.tick(1).unwrap();
    for fires in 2..=100 {
        let report = autoscaler.tick(fires).unwrap();
        assert!(report.is_quiet(), "tick {} issued calls: {:?}", fires, report);
    }
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));
    assert!(autoscaler.hit_counters().is_empty());
}

#[test]
fn test_full_pool_shrinks_target_after_at_target_grace() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    let idle = cloud.add(&batch, "batch-0", 0.05, false);
    cloud.add(&batch, "batch-1", 0.5, true);
    cloud.add(&batch, "batch-2", 0.5, true);
    let grace = autoscaler.policy().at_target_grace as u64;

    // Tick 1 seeds; the next `grace` ticks count.
    autoscaler.tick(1).unwrap();
    for fires in 2..=grace {
        let report = autoscaler.tick(fires).unwrap();
        assert!(report.destroyed.is_empty());
    }

    let report = autoscaler.tick(grace + 1).unwrap();
    assert_eq!(report.destroyed, vec![idle]);
    let kind_report = report.kind(&batch).unwrap();
    assert_eq!(kind_report.state, PoolState::AtTarget);
    assert_eq!(kind_report.target, Some(2));
    assert_eq!(kind_report.growth, GrowthDecision::Hold);
    assert_eq!(registry.workers(&batch).unwrap().len(), 2);

    // Two workers, target two: still at target and steady.
    let report = autoscaler.tick(grace + 2).unwrap();
    assert_eq!(report.kind(&batch).unwrap().state, PoolState::AtTarget);
    assert!(report.is_quiet());
}

#[test]
fn test_failed_destruction_at_target_keeps_target() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    let idle = cloud.add(&batch, "batch-0", 0.05, false);
    cloud.add(&batch, "batch-1", 0.5, true);
    cloud.add(&batch, "batch-2", 0.5, true);
    let grace = autoscaler.policy().at_target_grace as u64;

    autoscaler.tick(1).unwrap();
    for fires in 2..=grace {
        autoscaler.tick(fires).unwrap();
    }

    cloud.fail_destroys.store(1, Ordering::SeqCst);
    let report = autoscaler.tick(grace + 1).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.destroyed.is_empty());
    assert_eq!(report.kind(&batch).unwrap().destroyed, 0);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));
    assert_eq!(
        autoscaler.hit_counters().count(&idle),
        Some(grace as u32 - 1)
    );
    assert_eq!(registry.workers(&batch).unwrap().len(), 3);

    let report = autoscaler.tick(grace + 2).unwrap();
    assert_eq!(report.destroyed, vec![idle.clone()]);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(2));
    assert_eq!(autoscaler.hit_counters().count(&idle), None);
    assert_eq!(registry.workers(&batch).unwrap().len(), 2);
}

#[test]
fn test_excess_worker_shed_after_generic_grace() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    for i in 0..3 {
        cloud.add(&batch, &format!("batch-{}", i), 0.5, true);
    }
    let extra = cloud.add(&batch, "batch-extra", 0.02, false);
    autoscaler.tick(1).unwrap();

    let report = autoscaler.tick(2).unwrap();
    assert_eq!(report.kind(&batch).unwrap().state, PoolState::General);
    assert!(report.destroyed.is_empty());

    let report = autoscaler.tick(3).unwrap();
    assert_eq!(report.destroyed, vec![extra]);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));
}

fn shed_then_grow(skip_growth_after_destruction: bool) -> (usize, usize) {
    let policy = ScalingPolicy {
        skip_growth_after_destruction,
        ..ScalingPolicy::simple()
    };
    let (_registry, cloud, mut autoscaler) = setup(policy);
    let batch = kind("batch");
    cloud.add(&batch, "batch-0", 0.0, false);
    cloud.add(&batch, "batch-1", 1.0, true);
    cloud.add(&batch, "batch-2", 1.0, true);

    // Mean 2/3 stays under the 0.7 low threshold while the idle worker counts.
    let first = autoscaler.tick(1).unwrap();
    assert!(first.is_quiet());

    let second = autoscaler.tick(2).unwrap();
    assert_eq!(second.destroyed.len(), 1);
    (second.requested_for(&batch), cloud.requests_for(&batch))
}

#[test]
fn test_growth_skipped_after_destruction_when_configured() {
    assert_eq!(shed_then_grow(true), (0, 0));
}

#[test]
fn test_growth_evaluated_after_destruction_by_default() {
    // Remaining workers average 1.0: one transient worker.
    assert_eq!(shed_then_grow(false), (1, 1));
}

#[test]
fn test_failed_destruction_retried_next_tick() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let render = kind("render");
    let policy_grace = autoscaler.policy().singleton_grace as u64;
    let vm = cloud.add(&render, "render-1", 0.0, false);
    cloud.fail_destroys.store(1, Ordering::SeqCst);

    for fires in 1..policy_grace {
        autoscaler.tick(fires).unwrap();
    }

    let report = autoscaler.tick(policy_grace).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        ProvisioningError::DestructionFailure { .. }
    ));
    assert!(report.destroyed.is_empty());
    assert!(registry.contains(&render));
    assert_eq!(
        autoscaler.hit_counters().count(&vm),
        Some(policy_grace as u32 - 1)
    );

    let report = autoscaler.tick(policy_grace + 1).unwrap();
    assert_eq!(report.destroyed, vec![vm]);
    assert!(!registry.contains(&render));
    assert_eq!(autoscaler.stats().failures, 1);
}

#[test]
fn test_failed_provisioning_leaves_target_unchanged() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::pool_tracking());
    let batch = kind("batch");
    for i in 0..3 {
        cloud.add(&batch, &format!("batch-{}", i), 0.95, true);
    }
    autoscaler.tick(1).unwrap();

    cloud.fail_requests.store(1, Ordering::SeqCst);
    let report = autoscaler.tick(2).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.requested.is_empty());
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(3));

    let report = autoscaler.tick(3).unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(report.requested_for(&batch), 1);
    assert_eq!(autoscaler.pool_sizes().target(&batch), Some(4));
}

#[test]
fn test_failure_in_one_kind_does_not_stop_others() {
    let (registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let alpha = kind("alpha");
    let beta = kind("beta");
    registry.register_kind(alpha.clone());
    registry.register_kind(beta.clone());
    cloud.fail_requests.store(1, Ordering::SeqCst);

    let report = autoscaler.tick(1).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.requested, vec![beta.clone()]);
    assert_eq!(report.kinds.len(), 2);
}

#[test]
fn test_reregistered_kind_is_seeded_again() {
    let policy = ScalingPolicy {
        singleton_grace: 2,
        ..ScalingPolicy::pool_tracking()
    };
    let (registry, cloud, mut autoscaler) = setup(policy);
    let render = kind("render");
    cloud.add(&render, "render-1", 0.0, false);

    let report = autoscaler.tick(1).unwrap();
    assert_eq!(report.requested_for(&render), 3);
    autoscaler.tick(2).unwrap();
    let report = autoscaler.tick(3).unwrap();
    assert_eq!(report.forgotten, vec![render.clone()]);
    assert_eq!(autoscaler.pool_sizes().target(&render), None);

    registry.register_kind(render.clone());
    let report = autoscaler.tick(4).unwrap();
    assert_eq!(report.kind(&render).unwrap().state, PoolState::Seeding);
    assert_eq!(report.requested_for(&render), 3);
}

#[test]
fn test_report_serializes_to_json() {
    let (_registry, cloud, mut autoscaler) = setup(ScalingPolicy::simple());
    let batch = kind("batch");
    cloud.add(&batch, "batch-1", 0.9, true);

    let json = autoscaler.tick(7).unwrap().to_json().unwrap();
    assert!(json.contains("\"tick\":7"));
    assert!(json.contains("\"Transient\""));
    assert!(json.contains("\"batch\""));
}

#[test]
fn test_config_file_drives_policy() {
    use poolscale_core::ConfigLoader;
    use tempfile::TempDir;

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("poolscale.yaml");
    std::fs::write(
        &config_path,
        r#"
autoscaler:
  profile: simple
  singleton_grace: 3
kinds:
  - id: render
    initial_workers: 1
"#,
    )
    .expect("Failed to write config");

    let config = ConfigLoader::load_file(&config_path).unwrap();
    let (_registry, cloud, mut autoscaler) = setup(config.autoscaler.policy);
    let render = config.kinds[0].id.clone();
    let vm = cloud.add(&render, "render-1", 0.0, false);

    autoscaler.tick(1).unwrap();
    autoscaler.tick(2).unwrap();
    let report = autoscaler.tick(3).unwrap();
    assert_eq!(report.destroyed, vec![vm]);

    assert!(ConfigLoader::load_file(temp_dir.path().join("missing.yaml")).is_err());
}
