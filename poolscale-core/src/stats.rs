// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use serde::Serialize;

use crate::error::ProvisioningError;
use crate::state::{GrowthDecision, PoolState};
use crate::types::{WorkerId, WorkloadKind};

/// What the loop decided for one kind in one tick.
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: WorkloadKind,
    pub state: PoolState,
    /// Pool size in the registry snapshot.
    pub pool_size: usize,
    /// Target after this tick, if pool-size tracking is enabled.
    pub target: Option<usize>,
    /// Mean utilization the growth check used.
    pub utilization: Option<f64>,
    pub growth: GrowthDecision,
    pub destroyed: usize,
    pub requested: usize,
}

/// Everything one tick did, returned to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub kinds: Vec<KindReport>,
    /// One entry per successful `request_worker` call.
    pub requested: Vec<WorkloadKind>,
    pub destroyed: Vec<WorkerId>,
    pub forgotten: Vec<WorkloadKind>,
    #[serde(serialize_with = "serialize_failures")]
    pub failures: Vec<ProvisioningError>,
}

impl TickReport {
    pub(crate) fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    /// True if the tick issued no provisioning or destruction calls.
    pub fn is_quiet(&self) -> bool {
        self.requested.is_empty() && self.destroyed.is_empty() && self.failures.is_empty()
    }

    /// Successful requests for one kind.
    pub fn requested_for(&self, kind: &WorkloadKind) -> usize {
        self.requested.iter().filter(|k| *k == kind).count()
    }

    /// Report of one kind, if it was evaluated.
    pub fn kind(&self, kind: &WorkloadKind) -> Option<&KindReport> {
        self.kinds.iter().find(|r| &r.kind == kind)
    }

    /// Render as a single-line JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn serialize_failures<S>(failures: &[ProvisioningError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failures.iter().map(|f| f.to_string()))
}

/// Running totals across ticks.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AutoscalerStats {
    pub ticks: u64,
    pub requested: u64,
    pub destroyed: u64,
    pub failures: u64,
}

impl AutoscalerStats {
    pub(crate) fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.requested += report.requested.len() as u64;
        self.destroyed += report.destroyed.len() as u64;
        self.failures += report.failures.len() as u64;
    }
}
