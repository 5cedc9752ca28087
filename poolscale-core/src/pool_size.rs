// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-kind target pool sizes.
//!
//! The target is the loop's own expectation of how many workers a kind should
//! run. It only moves by one at a time and only through the loop; it selects
//! the branch of the per-kind state machine and is never enforced as a cap.

use std::collections::HashMap;

use crate::types::WorkloadKind;

/// Target size per kind.
#[derive(Debug, Default)]
pub struct PoolSizeTable {
    targets: HashMap<WorkloadKind, usize>,
}

impl PoolSizeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the target of `kind`. Returns false if it was already seeded.
    pub fn seed(&mut self, kind: &WorkloadKind, value: usize) -> bool {
        if self.targets.contains_key(kind) {
            return false;
        }
        self.targets.insert(kind.clone(), value);
        true
    }

    /// Current target of `kind`.
    pub fn target(&self, kind: &WorkloadKind) -> Option<usize> {
        self.targets.get(kind).copied()
    }

    /// Raise the target by one. Returns the new target.
    pub fn increment(&mut self, kind: &WorkloadKind) -> usize {
        let target = self.targets.entry(kind.clone()).or_insert(0);
        *target += 1;
        *target
    }

    /// Lower the target by one, never below zero. Returns the new target.
    pub fn decrement(&mut self, kind: &WorkloadKind) -> usize {
        let target = self.targets.entry(kind.clone()).or_insert(0);
        *target = target.saturating_sub(1);
        *target
    }

    /// Drop the target of a kind that left the registry.
    pub fn forget(&mut self, kind: &WorkloadKind) -> Option<usize> {
        self.targets.remove(kind)
    }

    /// Iterate over all targets.
    pub fn iter(&self) -> impl Iterator<Item = (&WorkloadKind, usize)> {
        self.targets.iter().map(|(kind, target)| (kind, *target))
    }

    /// Number of seeded kinds.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if no kind has been seeded.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(name: &str) -> WorkloadKind {
        WorkloadKind::new(name).unwrap()
    }

    #[test]
    fn test_seed_once() {
        let mut table = PoolSizeTable::new();
        let batch = kind("batch");

        assert!(table.seed(&batch, 3));
        assert!(!table.seed(&batch, 7));
        assert_eq!(table.target(&batch), Some(3));
    }

    #[test]
    fn test_ratchet() {
        let mut table = PoolSizeTable::new();
        let batch = kind("batch");
        table.seed(&batch, 3);

        assert_eq!(table.increment(&batch), 4);
        assert_eq!(table.decrement(&batch), 3);
        assert_eq!(table.target(&batch), Some(3));
    }

    #[test]
    fn test_decrement_saturates() {
        let mut table = PoolSizeTable::new();
        let batch = kind("batch");
        table.seed(&batch, 1);

        assert_eq!(table.decrement(&batch), 0);
        assert_eq!(table.decrement(&batch), 0);
    }

    #[test]
    fn test_forget_allows_reseed() {
        let mut table = PoolSizeTable::new();
        let render = kind("render");
        table.seed(&render, 3);

        assert_eq!(table.forget(&render), Some(3));
        assert!(table.is_empty());
        assert!(table.seed(&render, 3));
        assert_eq!(table.len(), 1);
    }
}
