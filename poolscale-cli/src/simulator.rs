// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Simulated cloud backend for driving the autoscaler without real machines.
//!
//! Requests and destructions are queued and only take effect when the next
//! tick is advanced, mirroring a provisioning backend that completes
//! asynchronously. Each kind's demand (in fully busy workers) is spread over
//! its pool front to back, so the first workers saturate and the tail idles.
//! Utilization is the mean of the last hour of per-tick samples.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;

use poolscale_core::{
    InMemoryPoolRegistry, KindConfig, ProvisioningError, ProvisioningGateway, UtilizationSource,
    WorkerHandle, WorkerId, WorkloadKind,
};

/// Operations accepted this tick, applied on the next [`SimulatedCloud::advance`].
#[derive(Debug, Default)]
struct PendingOps {
    create: Vec<WorkloadKind>,
    destroy: Vec<WorkerId>,
}

/// Trailing samples of one worker.
#[derive(Debug, Default)]
struct UsageWindow {
    samples: VecDeque<f64>,
}

impl UsageWindow {
    fn push(&mut self, sample: f64, capacity: usize) {
        if self.samples.len() == capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// In-process stand-in for a provisioning backend and a monitoring system.
pub struct SimulatedCloud {
    registry: Arc<InMemoryPoolRegistry>,
    demand: HashMap<WorkloadKind, KindConfig>,
    owners: DashMap<WorkerId, WorkloadKind>,
    usage: DashMap<WorkerId, UsageWindow>,
    pending: Mutex<PendingOps>,
    /// Per-tick samples that make up one hour.
    window: usize,
    /// Maximum live workers; requests beyond it fail.
    capacity: Option<usize>,
}

impl SimulatedCloud {
    /// Create a simulated cloud for the configured kinds.
    pub fn new(
        registry: Arc<InMemoryPoolRegistry>,
        kinds: &[KindConfig],
        tick_period: Duration,
        capacity: Option<usize>,
    ) -> Self {
        let window = (3600 / tick_period.as_secs().max(1)).max(1) as usize;

        Self {
            registry,
            demand: kinds.iter().map(|k| (k.id.clone(), k.clone())).collect(),
            owners: DashMap::new(),
            usage: DashMap::new(),
            pending: Mutex::new(PendingOps::default()),
            window,
            capacity,
        }
    }

    /// Register every configured kind with its initial workers.
    pub fn bootstrap(&self) {
        for kind in self.demand.values() {
            self.registry.register_kind(kind.id.clone());
            for _ in 0..kind.initial_workers {
                self.spawn(&kind.id);
            }
        }
    }

    /// Apply queued operations and sample utilization for `tick`.
    pub fn advance(&self, tick: u64) {
        let ops = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for id in ops.destroy {
            if let Some((_, kind)) = self.owners.remove(&id) {
                self.usage.remove(&id);
                if let Err(e) = self.registry.remove_worker(&kind, &id) {
                    tracing::debug!(worker = %id, error = %e, "Destroyed worker already gone");
                }
            }
        }
        for kind in ops.create {
            self.spawn(&kind);
        }

        for kind in self.registry.kinds() {
            let Ok(workers) = self.registry.workers(&kind) else {
                continue;
            };
            let mut load = self.demand.get(&kind).map_or(0.0, |k| k.load_at(tick));

            for worker in &workers {
                let share = load.min(1.0);
                load -= share;

                if let Some(mut window) = self.usage.get_mut(worker.id()) {
                    window.push(share, self.window);
                }
                if let Err(e) = self.registry.set_active_work(&kind, worker.id(), share > 0.0) {
                    tracing::debug!(worker = %worker, error = %e, "Worker vanished while sampling");
                }
            }
        }
    }

    /// Number of live workers.
    pub fn live_workers(&self) -> usize {
        self.owners.len()
    }

    fn spawn(&self, kind: &WorkloadKind) {
        let id = match WorkerId::new(format!("vm-{}", uuid::Uuid::new_v4().simple())) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Could not name new worker");
                return;
            }
        };

        self.owners.insert(id.clone(), kind.clone());
        self.usage.insert(id.clone(), UsageWindow::default());
        self.registry.add_worker(kind, WorkerHandle::new(id.clone()));
        tracing::debug!(kind = %kind, worker = %id, "Worker provisioned");
    }

    fn queued_creations(&self) -> usize {
        self.pending.lock().map(|p| p.create.len()).unwrap_or(0)
    }
}

impl UtilizationSource for SimulatedCloud {
    fn hourly_utilization(&self, worker: &WorkerHandle) -> f64 {
        self.usage
            .get(worker.id())
            .map(|window| window.mean())
            .unwrap_or(0.0)
    }
}

impl ProvisioningGateway for SimulatedCloud {
    fn request_worker(&self, kind: &WorkloadKind) -> Result<(), ProvisioningError> {
        if let Some(capacity) = self.capacity {
            if self.live_workers() + self.queued_creations() >= capacity {
                return Err(ProvisioningError::ProvisioningFailure {
                    kind: kind.clone(),
                    reason: format!("capacity of {} workers exhausted", capacity),
                });
            }
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| ProvisioningError::ProvisioningFailure {
                kind: kind.clone(),
                reason: "pending queue poisoned".to_string(),
            })?;
        pending.create.push(kind.clone());
        Ok(())
    }

    fn destroy_worker(&self, worker: &WorkerHandle) -> Result<(), ProvisioningError> {
        if !self.owners.contains_key(worker.id()) {
            return Err(ProvisioningError::DestructionFailure {
                worker: worker.id().clone(),
                reason: "unknown worker".to_string(),
            });
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| ProvisioningError::DestructionFailure {
                worker: worker.id().clone(),
                reason: "pending queue poisoned".to_string(),
            })?;
        pending.destroy.push(worker.id().clone());
        Ok(())
    }
}
