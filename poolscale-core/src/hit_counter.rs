// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Debounce counters for destruction candidates.
//!
//! A worker is destroyed only after it qualifies as a candidate on `threshold`
//! consecutive ticks. Any tick on which it does not qualify must clear its
//! entry, so no partial progress survives an interruption.

use std::collections::{HashMap, HashSet};

use crate::backend::ProvisioningGateway;
use crate::error::ProvisioningError;
use crate::types::{WorkerHandle, WorkerId};

/// Consecutive qualifying ticks per worker.
#[derive(Debug, Default)]
pub struct HitCounterTable {
    hits: HashMap<WorkerId, u32>,
}

impl HitCounterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one qualifying tick for `worker`.
    ///
    /// Returns `Ok(true)` when this tick reaches `threshold` and the worker
    /// was destroyed through `gateway`. If destruction fails the entry is
    /// re-armed one short of the threshold so the next qualifying tick
    /// retries, and the failure is returned.
    pub fn register_or_increment(
        &mut self,
        worker: &WorkerHandle,
        threshold: u32,
        gateway: &dyn ProvisioningGateway,
    ) -> Result<bool, ProvisioningError> {
        let count = self.hits.get(worker.id()).map_or(1, |hits| hits + 1);

        if count < threshold {
            self.hits.insert(worker.id().clone(), count);
            tracing::trace!(worker = %worker, count, threshold, "Destruction candidate");
            return Ok(false);
        }

        self.hits.remove(worker.id());
        match gateway.destroy_worker(worker) {
            Ok(()) => {
                tracing::debug!(worker = %worker, threshold, "Grace period elapsed, worker destroyed");
                Ok(true)
            }
            Err(e) => {
                self.hits
                    .insert(worker.id().clone(), threshold.saturating_sub(1));
                Err(e)
            }
        }
    }

    /// Drop any progress recorded for `worker`.
    pub fn clear(&mut self, worker: &WorkerId) {
        if self.hits.remove(worker).is_some() {
            tracing::trace!(worker = %worker, "Candidate streak broken");
        }
    }

    /// Current streak of a worker, if it is a candidate.
    pub fn count(&self, worker: &WorkerId) -> Option<u32> {
        self.hits.get(worker).copied()
    }

    /// Drop entries for workers that are no longer in any pool.
    pub fn retain_workers(&mut self, live: &HashSet<&WorkerId>) {
        self.hits.retain(|id, _| live.contains(id));
    }

    /// Number of tracked candidates.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Check if no worker is a candidate.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
