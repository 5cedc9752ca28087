// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Pool-level utilization.

use crate::backend::UtilizationSource;
use crate::types::WorkerHandle;

/// Clamp a reading into `[0, 1]`; non-finite readings count as idle.
pub fn sanitize(reading: f64) -> f64 {
    if reading.is_finite() {
        reading.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Mean hourly utilization over every worker of a pool, busy or idle.
/// `None` for an empty pool.
pub fn aggregate_utilization(
    workers: &[WorkerHandle],
    source: &dyn UtilizationSource,
) -> Option<f64> {
    if workers.is_empty() {
        return None;
    }

    let sum: f64 = workers
        .iter()
        .map(|worker| sanitize(source.hourly_utilization(worker)))
        .sum();

    Some(sum / workers.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::types::WorkerId;

    struct FixedSource(HashMap<String, f64>);

    impl UtilizationSource for FixedSource {
        fn hourly_utilization(&self, worker: &WorkerHandle) -> f64 {
            self.0.get(worker.id().as_str()).copied().unwrap_or(0.0)
        }
    }

    fn workers(ids: &[&str]) -> Vec<WorkerHandle> {
        ids.iter()
            .map(|id| WorkerHandle::new(WorkerId::new(*id).unwrap()))
            .collect()
    }

    #[test]
    fn test_mean_over_all_workers() {
        let source = FixedSource(
            [("a".to_string(), 0.9), ("b".to_string(), 0.3)]
                .into_iter()
                .collect(),
        );
        let mean = aggregate_utilization(&workers(&["a", "b", "c"]), &source).unwrap();
        assert!((mean - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_pool() {
        let source = FixedSource(HashMap::new());
        assert_eq!(aggregate_utilization(&[], &source), None);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize(1.7), 1.0);
        assert_eq!(sanitize(-0.2), 0.0);
        assert_eq!(sanitize(f64::NAN), 0.0);
        assert_eq!(sanitize(0.42), 0.42);
    }
}
