// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Thread-safe pool registry using DashMap.
//!
//! Buckets workers into per-kind pools. The autoscaler only reads snapshots
//! and forgets kinds; membership is changed by the provisioning backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::PoolRegistry;
use crate::error::{AutoscaleError, AutoscaleResult};
use crate::types::{WorkerHandle, WorkerId, WorkloadKind};

/// In-memory registry of kind → ordered workers.
/// Uses DashMap for lock-free concurrent access.
#[derive(Debug, Default)]
pub struct InMemoryPoolRegistry {
    pools: DashMap<WorkloadKind, Vec<WorkerHandle>>,
}

impl InMemoryPoolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Create a registry wrapped in an Arc for sharing across threads.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a kind with an empty pool. Registering a known kind is a no-op.
    pub fn register_kind(&self, kind: WorkloadKind) {
        self.pools.entry(kind).or_default();
    }

    /// Append a worker to a kind's pool, registering the kind if needed.
    pub fn add_worker(&self, kind: &WorkloadKind, worker: WorkerHandle) {
        self.pools.entry(kind.clone()).or_default().push(worker);
    }

    /// Remove a worker from a kind's pool. The kind stays registered.
    pub fn remove_worker(&self, kind: &WorkloadKind, worker: &WorkerId) -> AutoscaleResult<WorkerHandle> {
        let mut pool = self
            .pools
            .get_mut(kind)
            .ok_or_else(|| AutoscaleError::KindNotFound(kind.clone()))?;

        let index = pool
            .iter()
            .position(|w| w.id() == worker)
            .ok_or_else(|| AutoscaleError::WorkerNotFound {
                kind: kind.clone(),
                worker: worker.clone(),
            })?;

        Ok(pool.remove(index))
    }

    /// Mark a worker as busy or idle.
    pub fn set_active_work(
        &self,
        kind: &WorkloadKind,
        worker: &WorkerId,
        active: bool,
    ) -> AutoscaleResult<()> {
        let mut pool = self
            .pools
            .get_mut(kind)
            .ok_or_else(|| AutoscaleError::KindNotFound(kind.clone()))?;

        let handle = pool
            .iter_mut()
            .find(|w| w.id() == worker)
            .ok_or_else(|| AutoscaleError::WorkerNotFound {
                kind: kind.clone(),
                worker: worker.clone(),
            })?;

        handle.set_active_work(active);
        Ok(())
    }

    /// Workers of a kind, in insertion order.
    pub fn workers(&self, kind: &WorkloadKind) -> AutoscaleResult<Vec<WorkerHandle>> {
        self.pools
            .get(kind)
            .map(|pool| pool.clone())
            .ok_or_else(|| AutoscaleError::KindNotFound(kind.clone()))
    }

    /// Check if a kind is registered.
    pub fn contains(&self, kind: &WorkloadKind) -> bool {
        self.pools.contains_key(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<WorkloadKind> {
        let mut kinds: Vec<_> = self.pools.iter().map(|r| r.key().clone()).collect();
        kinds.sort();
        kinds
    }
}

impl PoolRegistry for InMemoryPoolRegistry {
    fn kinds_and_workers(&self) -> BTreeMap<WorkloadKind, Vec<WorkerHandle>> {
        self.pools
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    fn forget_kind(&self, kind: &WorkloadKind) {
        if let Some((_, pool)) = self.pools.remove(kind) {
            tracing::debug!(kind = %kind, remaining = pool.len(), "Kind forgotten");
        }
    }
}
