// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-kind pool states.
//!
//! The loop keeps no mode between ticks. Each tick a kind is classified from
//! its current pool size and target, and the state selects which shrink rule
//! applies: Empty → Singleton → AtTarget → General, first match wins.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a kind's pool in the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolState {
    /// Seen for the first time: target seeded, burst requested.
    Seeding,

    /// No workers at all.
    Empty,

    /// Exactly one worker, protected by the long singleton grace.
    Singleton,

    /// Pool size equals the tracked target.
    AtTarget,

    /// Any other size: excess capacity is shed quickly.
    General,
}

impl PoolState {
    /// Get the state name for logs and reports.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Seeding => "Seeding",
            Self::Empty => "Empty",
            Self::Singleton => "Singleton",
            Self::AtTarget => "AtTarget",
            Self::General => "General",
        }
    }

    /// Classify a pool of `size` workers against its `target`.
    ///
    /// `target` is `None` when pool-size tracking is disabled, in which case
    /// AtTarget is never selected.
    pub fn classify(size: usize, target: Option<usize>) -> Self {
        match (size, target) {
            (0, _) => Self::Empty,
            (1, _) => Self::Singleton,
            (n, Some(t)) if n == t => Self::AtTarget,
            _ => Self::General,
        }
    }

    /// Whether the growth check may run after this state's shrink rule.
    pub fn evaluates_growth(&self) -> bool {
        !matches!(self, Self::Seeding | Self::Empty)
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the growth check for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthDecision {
    /// Mean utilization above the high threshold: target raised, worker requested.
    Durable,
    /// Mean utilization above the low threshold: transient worker requested.
    Transient,
    /// Thresholds satisfied.
    Hold,
    /// Growth check did not run this tick.
    Skipped,
}

impl GrowthDecision {
    /// Get the decision name for logs and reports.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Durable => "Durable",
            Self::Transient => "Transient",
            Self::Hold => "Hold",
            Self::Skipped => "Skipped",
        }
    }
}
