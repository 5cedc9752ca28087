// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! The `autoscaler` section selects a [`ScalingProfile`] and may override any
//! of its constants. The `kinds` section lists the workload kinds to register
//! at startup together with the synthetic demand used by the simulator.
//! Any invalid field results in a HardValidationError that prevents startup.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutoscaleError, AutoscaleResult, HardValidationError};
use crate::types::WorkloadKind;

/// The two built-in policy variants of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingProfile {
    /// One worker per new kind, shed idle workers, add transient workers
    /// under load. Growth is not evaluated in a tick that destroyed a worker.
    Simple,
    /// Tracks a target pool size per kind: seeds new kinds with a burst,
    /// shrinks the target when a full pool idles, grows it under heavy load.
    PoolTracking,
}

impl ScalingProfile {
    /// Get the profile name for display.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::PoolTracking => "pool_tracking",
        }
    }
}

/// Validated constants of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub profile: ScalingProfile,
    /// Seeding, the at-target shrink branch and durable growth.
    pub pool_tracking: bool,
    /// Initial target size and burst for a newly observed kind.
    pub seed_pool_size: usize,
    /// Idle workers below this hourly utilization are destruction candidates.
    pub min_utilization: f64,
    /// Mean utilization above which a transient worker is requested.
    pub low_threshold: f64,
    /// Mean utilization above which the target grows (pool tracking only).
    pub high_threshold: f64,
    pub singleton_grace: u32,
    pub at_target_grace: u32,
    pub generic_grace: u32,
    /// Skip the growth check for a kind that lost a worker this tick.
    pub skip_growth_after_destruction: bool,
}

impl ScalingPolicy {
    /// Defaults of the given profile.
    pub fn for_profile(profile: ScalingProfile) -> Self {
        match profile {
            ScalingProfile::Simple => Self {
                profile,
                pool_tracking: false,
                seed_pool_size: 1,
                min_utilization: 0.1,
                low_threshold: 0.7,
                high_threshold: 0.8,
                singleton_grace: 30,
                at_target_grace: 10,
                generic_grace: 2,
                skip_growth_after_destruction: true,
            },
            ScalingProfile::PoolTracking => Self {
                profile,
                pool_tracking: true,
                seed_pool_size: 3,
                min_utilization: 0.1,
                low_threshold: 0.65,
                high_threshold: 0.8,
                singleton_grace: 30,
                at_target_grace: 10,
                generic_grace: 2,
                skip_growth_after_destruction: false,
            },
        }
    }

    /// The simplified variant.
    pub fn simple() -> Self {
        Self::for_profile(ScalingProfile::Simple)
    }

    /// The pool-size-tracking variant.
    pub fn pool_tracking() -> Self {
        Self::for_profile(ScalingProfile::PoolTracking)
    }
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self::pool_tracking()
    }
}

/// Raw autoscaler section as parsed from YAML (before validation).
/// Unset fields fall back to the profile defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAutoscalerConfig {
    #[serde(default)]
    profile: Option<ScalingProfile>,
    #[serde(default = "default_tick_period_secs")]
    tick_period_secs: u64,
    seed_pool_size: Option<usize>,
    min_utilization: Option<f64>,
    low_threshold: Option<f64>,
    high_threshold: Option<f64>,
    singleton_grace: Option<u32>,
    at_target_grace: Option<u32>,
    generic_grace: Option<u32>,
    skip_growth_after_destruction: Option<bool>,
}

fn default_tick_period_secs() -> u64 {
    120 // 2 minutes: 30 ticks make an hour of singleton grace
}

impl Default for RawAutoscalerConfig {
    fn default() -> Self {
        Self {
            profile: None,
            tick_period_secs: default_tick_period_secs(),
            seed_pool_size: None,
            min_utilization: None,
            low_threshold: None,
            high_threshold: None,
            singleton_grace: None,
            at_target_grace: None,
            generic_grace: None,
            skip_growth_after_destruction: None,
        }
    }
}

/// Raw demand phase.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDemandPhase {
    from_tick: u64,
    load: f64,
}

/// Raw kind configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKindConfig {
    id: String,
    #[serde(default)]
    initial_workers: usize,
    #[serde(default)]
    demand: Vec<RawDemandPhase>,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    autoscaler: RawAutoscalerConfig,
    #[serde(default)]
    kinds: Vec<RawKindConfig>,
}

/// Synthetic load applied to a kind from `from_tick` onwards.
/// `load` is measured in fully busy workers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandPhase {
    pub from_tick: u64,
    pub load: f64,
}

/// Validated kind configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindConfig {
    pub id: WorkloadKind,
    pub initial_workers: usize,
    pub demand: Vec<DemandPhase>,
}

impl KindConfig {
    /// Demand in effect at the given tick (0 before the first phase).
    pub fn load_at(&self, tick: u64) -> f64 {
        self.demand
            .iter()
            .take_while(|phase| phase.from_tick <= tick)
            .last()
            .map(|phase| phase.load)
            .unwrap_or(0.0)
    }
}

/// Validated autoscaler configuration.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    pub policy: ScalingPolicy,
    pub tick_period: Duration,
}

/// Complete validated configuration.
#[derive(Debug)]
pub struct Config {
    pub autoscaler: AutoscalerConfig,
    pub kinds: Vec<KindConfig>,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> AutoscaleResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AutoscaleError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AutoscaleError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> AutoscaleResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| AutoscaleError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> AutoscaleResult<Config> {
        let autoscaler = Self::validate_autoscaler(raw.autoscaler)?;

        let mut kinds = Vec::with_capacity(raw.kinds.len());
        let mut seen_ids = HashSet::new();

        for (index, raw_kind) in raw.kinds.into_iter().enumerate() {
            let kind = Self::validate_kind(raw_kind, index)?;

            if !seen_ids.insert(kind.id.clone()) {
                return Err(HardValidationError::DuplicateKind {
                    id: kind.id.to_string(),
                }
                .into());
            }

            kinds.push(kind);
        }

        Ok(Config { autoscaler, kinds })
    }

    /// Validate the autoscaler section and resolve it against its profile.
    fn validate_autoscaler(raw: RawAutoscalerConfig) -> AutoscaleResult<AutoscalerConfig> {
        let defaults = ScalingPolicy::for_profile(raw.profile.unwrap_or(ScalingProfile::PoolTracking));

        let policy = ScalingPolicy {
            seed_pool_size: raw.seed_pool_size.unwrap_or(defaults.seed_pool_size),
            min_utilization: raw.min_utilization.unwrap_or(defaults.min_utilization),
            low_threshold: raw.low_threshold.unwrap_or(defaults.low_threshold),
            high_threshold: raw.high_threshold.unwrap_or(defaults.high_threshold),
            singleton_grace: raw.singleton_grace.unwrap_or(defaults.singleton_grace),
            at_target_grace: raw.at_target_grace.unwrap_or(defaults.at_target_grace),
            generic_grace: raw.generic_grace.unwrap_or(defaults.generic_grace),
            skip_growth_after_destruction: raw
                .skip_growth_after_destruction
                .unwrap_or(defaults.skip_growth_after_destruction),
            ..defaults
        };

        Self::validate_policy(&policy)?;

        if raw.tick_period_secs == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "tick_period_secs",
                value: "0".to_string(),
                reason: "Tick period must be at least one second".to_string(),
            }
            .into());
        }

        Ok(AutoscalerConfig {
            policy,
            tick_period: Duration::from_secs(raw.tick_period_secs),
        })
    }

    /// Validate the constants of a policy.
    pub fn validate_policy(policy: &ScalingPolicy) -> Result<(), HardValidationError> {
        for (field, value) in [
            ("min_utilization", policy.min_utilization),
            ("low_threshold", policy.low_threshold),
            ("high_threshold", policy.high_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(HardValidationError::ThresholdOutOfRange { field, value });
            }
        }

        if policy.min_utilization >= policy.low_threshold {
            return Err(HardValidationError::InvalidFieldValue {
                field: "min_utilization",
                value: policy.min_utilization.to_string(),
                reason: format!(
                    "Must be below low_threshold ({}) or pools would grow and shrink on the same reading",
                    policy.low_threshold
                ),
            });
        }

        if policy.low_threshold > policy.high_threshold {
            return Err(HardValidationError::InvalidFieldValue {
                field: "low_threshold",
                value: policy.low_threshold.to_string(),
                reason: format!(
                    "Must not exceed high_threshold ({})",
                    policy.high_threshold
                ),
            });
        }

        for (field, grace) in [
            ("singleton_grace", policy.singleton_grace),
            ("at_target_grace", policy.at_target_grace),
            ("generic_grace", policy.generic_grace),
        ] {
            if grace == 0 {
                return Err(HardValidationError::InvalidFieldValue {
                    field,
                    value: "0".to_string(),
                    reason: "Grace period must be at least one tick".to_string(),
                });
            }
        }

        if policy.seed_pool_size == 0 || policy.seed_pool_size > 1000 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "seed_pool_size",
                value: policy.seed_pool_size.to_string(),
                reason: "Must be between 1 and 1000".to_string(),
            });
        }

        Ok(())
    }

    /// Validate a single kind configuration.
    fn validate_kind(raw: RawKindConfig, index: usize) -> AutoscaleResult<KindConfig> {
        let context = format!("kind at index {}", index);

        let id = WorkloadKind::new(&raw.id)?;

        let mut last_tick = None;
        let mut demand = Vec::with_capacity(raw.demand.len());
        for phase in raw.demand {
            if !phase.load.is_finite() || phase.load < 0.0 {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "demand.load",
                    value: phase.load.to_string(),
                    reason: format!("Load must be a non-negative number in {}", context),
                }
                .into());
            }

            if last_tick.is_some_and(|last| phase.from_tick <= last) {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "demand.from_tick",
                    value: phase.from_tick.to_string(),
                    reason: format!("Demand phases must be strictly ordered in {}", context),
                }
                .into());
            }
            last_tick = Some(phase.from_tick);

            demand.push(DemandPhase {
                from_tick: phase.from_tick,
                load: phase.load,
            });
        }

        Ok(KindConfig {
            id,
            initial_workers: raw.initial_workers,
            demand,
        })
    }
}
