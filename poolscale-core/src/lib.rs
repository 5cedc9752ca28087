//! poolscale Core Library
//!
//! Reactive, threshold-based autoscaling for pools of workers grouped by
//! workload kind. Provides the per-tick control loop, its debounce and
//! target-size tables, the collaborator interfaces it drives, an in-memory
//! pool registry, and YAML configuration parsing.

pub mod autoscaler;
pub mod backend;
pub mod config;
pub mod error;
pub mod hit_counter;
pub mod pool_size;
pub mod registry;
pub mod state;
pub mod stats;
pub mod types;
pub mod utilization;

// Re-export commonly used types
pub use autoscaler::AutoscalerLoop;
pub use backend::{PoolRegistry, ProvisioningGateway, UtilizationSource};
pub use config::{
    AutoscalerConfig, Config, ConfigLoader, DemandPhase, KindConfig, ScalingPolicy, ScalingProfile,
};
pub use error::{AutoscaleError, AutoscaleResult, HardValidationError, ProvisioningError};
pub use hit_counter::HitCounterTable;
pub use pool_size::PoolSizeTable;
pub use registry::InMemoryPoolRegistry;
pub use state::{GrowthDecision, PoolState};
pub use stats::{AutoscalerStats, KindReport, TickReport};
pub use types::{WorkerHandle, WorkerId, WorkloadKind};
pub use utilization::aggregate_utilization;
