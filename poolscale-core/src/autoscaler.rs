// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Threshold-based autoscaling control loop.
//!
//! Invoked once per tick. For every kind in the registry snapshot:
//!
//! ```text
//! first sighting (pool tracking):  target = seed; request seed workers; done
//! n == 0 (simple):                 request 1 worker; done
//! n == 0 (pool tracking):          wait for the seed burst; done
//! n == 1:                          idle for singleton_grace ticks -> destroy, forget kind; done
//! n == target (pool tracking):     idle & util < min for at_target_grace ticks -> destroy, target -= 1
//! otherwise:                       idle & util < min for generic_grace ticks -> destroy
//!
//! growth, over the remaining workers:
//! mean > high (pool tracking):     target += 1; request 1 worker
//! mean > low:                      request 1 worker
//! ```
//!
//! Debounce counters and targets are owned by the loop and are the only state
//! carried between ticks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{PoolRegistry, ProvisioningGateway, UtilizationSource};
use crate::config::{ConfigLoader, ScalingPolicy};
use crate::error::{AutoscaleError, AutoscaleResult, HardValidationError};
use crate::hit_counter::HitCounterTable;
use crate::pool_size::PoolSizeTable;
use crate::state::{GrowthDecision, PoolState};
use crate::stats::{AutoscalerStats, KindReport, TickReport};
use crate::types::{WorkerHandle, WorkerId, WorkloadKind};
use crate::utilization::{aggregate_utilization, sanitize};

/// The control loop. Holds the debounce and target tables for its lifetime.
pub struct AutoscalerLoop {
    policy: ScalingPolicy,
    registry: Arc<dyn PoolRegistry>,
    utilization: Arc<dyn UtilizationSource>,
    gateway: Arc<dyn ProvisioningGateway>,
    hits: HitCounterTable,
    targets: PoolSizeTable,
    last_tick: Option<u64>,
    stats: AutoscalerStats,
}

impl AutoscalerLoop {
    /// Create a loop over the given collaborators.
    /// Fails if the policy constants are inconsistent.
    pub fn new(
        policy: ScalingPolicy,
        registry: Arc<dyn PoolRegistry>,
        utilization: Arc<dyn UtilizationSource>,
        gateway: Arc<dyn ProvisioningGateway>,
    ) -> Result<Self, HardValidationError> {
        ConfigLoader::validate_policy(&policy)?;

        Ok(Self {
            policy,
            registry,
            utilization,
            gateway,
            hits: HitCounterTable::new(),
            targets: PoolSizeTable::new(),
            last_tick: None,
            stats: AutoscalerStats::default(),
        })
    }

    /// The policy in effect.
    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    /// Debounce counters.
    pub fn hit_counters(&self) -> &HitCounterTable {
        &self.hits
    }

    /// Target pool sizes.
    pub fn pool_sizes(&self) -> &PoolSizeTable {
        &self.targets
    }

    /// Totals since the loop was created.
    pub fn stats(&self) -> AutoscalerStats {
        self.stats
    }

    /// Evaluate every kind once.
    ///
    /// `fires` must grow strictly from call to call: a repeated tick would
    /// double-count the debounce counters and is rejected. Provisioning
    /// failures do not abort the tick; they are collected in the report.
    pub fn tick(&mut self, fires: u64) -> AutoscaleResult<TickReport> {
        if let Some(last) = self.last_tick {
            if fires <= last {
                return Err(AutoscaleError::DuplicateTick {
                    last,
                    received: fires,
                });
            }
        }
        self.last_tick = Some(fires);

        let snapshot = self.registry.kinds_and_workers();

        // Counters of workers removed behind our back would never be cleared.
        let live: HashSet<&WorkerId> = snapshot.values().flatten().map(|w| w.id()).collect();
        self.hits.retain_workers(&live);

        // A kind that left the registry is seeded afresh if it comes back.
        let vanished: Vec<WorkloadKind> = self
            .targets
            .iter()
            .filter(|(kind, _)| !snapshot.contains_key(*kind))
            .map(|(kind, _)| kind.clone())
            .collect();
        for kind in &vanished {
            self.targets.forget(kind);
        }

        let mut report = TickReport::new(fires);
        for (kind, workers) in &snapshot {
            let kind_report = self.evaluate_kind(kind, workers, &mut report);
            debug!(
                tick = fires,
                kind = %kind,
                state = kind_report.state.name(),
                pool_size = kind_report.pool_size,
                target = ?kind_report.target,
                utilization = ?kind_report.utilization,
                growth = kind_report.growth.name(),
                "Kind evaluated"
            );
            report.kinds.push(kind_report);
        }

        if !report.failures.is_empty() {
            warn!(
                tick = fires,
                failures = report.failures.len(),
                "Tick completed with provisioning failures"
            );
        }

        self.stats.record(&report);
        Ok(report)
    }

    fn evaluate_kind(
        &mut self,
        kind: &WorkloadKind,
        workers: &[WorkerHandle],
        report: &mut TickReport,
    ) -> KindReport {
        let mut kind_report = KindReport {
            kind: kind.clone(),
            state: PoolState::Seeding,
            pool_size: workers.len(),
            target: None,
            utilization: None,
            growth: GrowthDecision::Skipped,
            destroyed: 0,
            requested: 0,
        };

        if self.policy.pool_tracking && self.targets.seed(kind, self.policy.seed_pool_size) {
            info!(
                kind = %kind,
                target = self.policy.seed_pool_size,
                "New kind observed, seeding pool"
            );
            for _ in 0..self.policy.seed_pool_size {
                if self.request_worker(kind, report) {
                    kind_report.requested += 1;
                }
            }
            kind_report.target = self.targets.target(kind);
            return kind_report;
        }

        let target = if self.policy.pool_tracking {
            self.targets.target(kind)
        } else {
            None
        };
        let state = PoolState::classify(workers.len(), target);
        kind_report.state = state;

        // Workers still in the pool once this tick's destructions are applied.
        let mut remaining: Vec<WorkerHandle> = workers.to_vec();

        match state {
            PoolState::Seeding | PoolState::Empty => {
                // Tracked kinds wait for their seed burst to land.
                if !self.policy.pool_tracking && self.request_worker(kind, report) {
                    kind_report.requested += 1;
                }
            }
            PoolState::Singleton => {
                let worker = &workers[0];
                if worker.has_active_work() {
                    self.hits.clear(worker.id());
                } else if self.debounce(worker, self.policy.singleton_grace, report) {
                    info!(kind = %kind, worker = %worker, "Last worker idle for grace period, kind dropped");
                    self.registry.forget_kind(kind);
                    self.targets.forget(kind);
                    report.forgotten.push(kind.clone());
                    kind_report.destroyed = 1;
                    return kind_report;
                }
            }
            PoolState::AtTarget => {
                for worker in workers {
                    if !self.is_candidate(worker) {
                        self.hits.clear(worker.id());
                    } else if self.debounce(worker, self.policy.at_target_grace, report) {
                        let target = self.targets.decrement(kind);
                        info!(kind = %kind, worker = %worker, target, "Full pool underused, target lowered");
                        remaining.retain(|w| w.id() != worker.id());
                        kind_report.destroyed += 1;
                    }
                }
            }
            PoolState::General => {
                for worker in workers {
                    if !self.is_candidate(worker) {
                        self.hits.clear(worker.id());
                    } else if self.debounce(worker, self.policy.generic_grace, report) {
                        debug!(kind = %kind, worker = %worker, "Excess worker destroyed");
                        remaining.retain(|w| w.id() != worker.id());
                        kind_report.destroyed += 1;
                    }
                }
            }
        }

        let skip_growth = kind_report.destroyed > 0 && self.policy.skip_growth_after_destruction;
        if state.evaluates_growth() && !skip_growth {
            self.check_growth(&remaining, &mut kind_report, report);
        }
        kind_report.target = self.current_target(kind);
        kind_report
    }

    /// Growth check over the pool left after this tick's destructions.
    fn check_growth(
        &mut self,
        pool: &[WorkerHandle],
        kind_report: &mut KindReport,
        report: &mut TickReport,
    ) {
        let kind = kind_report.kind.clone();
        let Some(mean) = aggregate_utilization(pool, self.utilization.as_ref()) else {
            return;
        };
        kind_report.utilization = Some(mean);

        if self.policy.pool_tracking && mean > self.policy.high_threshold {
            kind_report.growth = GrowthDecision::Durable;
            if self.request_worker(&kind, report) {
                let target = self.targets.increment(&kind);
                info!(kind = %kind, utilization = mean, target, "Pool overloaded, target raised");
                kind_report.requested += 1;
            }
        } else if mean > self.policy.low_threshold {
            kind_report.growth = GrowthDecision::Transient;
            if self.request_worker(&kind, report) {
                debug!(kind = %kind, utilization = mean, "Pool busy, transient worker requested");
                kind_report.requested += 1;
            }
        } else {
            kind_report.growth = GrowthDecision::Hold;
        }
    }

    /// Idle and below the minimum utilization.
    fn is_candidate(&self, worker: &WorkerHandle) -> bool {
        !worker.has_active_work()
            && sanitize(self.utilization.hourly_utilization(worker)) < self.policy.min_utilization
    }

    /// Count one qualifying tick; true if the worker was destroyed.
    fn debounce(&mut self, worker: &WorkerHandle, grace: u32, report: &mut TickReport) -> bool {
        match self
            .hits
            .register_or_increment(worker, grace, self.gateway.as_ref())
        {
            Ok(true) => {
                report.destroyed.push(worker.id().clone());
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(worker = %worker, error = %e, "Destruction failed, will retry next qualifying tick");
                report.failures.push(e);
                false
            }
        }
    }

    /// Issue one provisioning request; true if the backend accepted it.
    fn request_worker(&self, kind: &WorkloadKind, report: &mut TickReport) -> bool {
        match self.gateway.request_worker(kind) {
            Ok(()) => {
                report.requested.push(kind.clone());
                true
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Worker request failed");
                report.failures.push(e);
                false
            }
        }
    }

    fn current_target(&self, kind: &WorkloadKind) -> Option<usize> {
        if self.policy.pool_tracking {
            self.targets.target(kind)
        } else {
            None
        }
    }
}
