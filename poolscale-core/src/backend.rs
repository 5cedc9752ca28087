// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Interfaces of the collaborators the control loop drives.
//!
//! The loop never provisions, measures, or tracks membership itself: it reads
//! a snapshot from a [`PoolRegistry`], asks a [`UtilizationSource`] for each
//! worker's trailing-hour utilization, and issues fire-and-forget requests to
//! a [`ProvisioningGateway`]. Membership changes caused by those requests show
//! up in a later snapshot.

use std::collections::BTreeMap;

use crate::error::ProvisioningError;
use crate::types::{WorkerHandle, WorkloadKind};

/// Source of truth for which workers belong to which kind.
pub trait PoolRegistry: Send + Sync {
    /// Snapshot of every kind and its workers at call time.
    fn kinds_and_workers(&self) -> BTreeMap<WorkloadKind, Vec<WorkerHandle>>;

    /// Drop a kind whose last worker was destroyed.
    fn forget_kind(&self, kind: &WorkloadKind);
}

/// Trailing-window utilization of a worker, as a fraction in `[0, 1]`.
pub trait UtilizationSource: Send + Sync {
    fn hourly_utilization(&self, worker: &WorkerHandle) -> f64;
}

/// Backend that creates and tears down workers.
pub trait ProvisioningGateway: Send + Sync {
    /// Ask for one more worker of the given kind.
    fn request_worker(&self, kind: &WorkloadKind) -> Result<(), ProvisioningError>;

    /// Tear down a worker.
    fn destroy_worker(&self, worker: &WorkerHandle) -> Result<(), ProvisioningError>;
}
