// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `poolscale run` command - Drive the autoscaler against a simulated cloud.
//!
//! Each tick first lets the simulated backend apply last tick's requests,
//! then runs one evaluation of the control loop.

use std::sync::Arc;
use std::time::Duration;

use poolscale_core::{
    AutoscaleResult, AutoscalerLoop, AutoscalerStats, Config, ConfigLoader, InMemoryPoolRegistry,
    TickReport,
};

use crate::metrics;
use crate::simulator::SimulatedCloud;

/// Options of a simulation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after this many ticks (None: until Ctrl+C).
    pub ticks: Option<u64>,
    /// Wait one configured tick period between ticks.
    pub realtime: bool,
    /// Fail worker requests beyond this many live workers.
    pub capacity: Option<usize>,
    /// Print one JSON report per tick instead of a summary line.
    pub json: bool,
}

pub async fn execute(
    config_path: &str,
    options: RunOptions,
    metrics_port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, "Starting autoscaler");

    // Load and validate configuration - fail fast on invalid config
    let config = ConfigLoader::load_file(config_path)?;

    tracing::info!(
        profile = config.autoscaler.policy.profile.name(),
        kinds = config.kinds.len(),
        "Configuration validated successfully"
    );

    if let Some(port) = metrics_port {
        metrics::start_metrics_server(port);
    }

    let json = options.json;
    let stats = simulate(&config, options, |report, registry| {
        metrics::record_tick(report, registry);
        if json {
            match report.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "Failed to encode tick report"),
            }
        } else {
            print_tick(report);
        }
    })
    .await?;

    if !json {
        println!();
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                     AUTOSCALER SUMMARY                       ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ Ticks evaluated:      {:<39}║", stats.ticks);
        println!("║ Workers requested:    {:<39}║", stats.requested);
        println!("║ Workers destroyed:    {:<39}║", stats.destroyed);
        println!("║ Provisioning errors:  {:<39}║", stats.failures);
        println!("╚══════════════════════════════════════════════════════════════╝");
    }

    Ok(())
}

/// Run the loop until `options.ticks` is reached or Ctrl+C is pressed.
/// `on_tick` sees every report together with the registry it was computed from.
pub async fn simulate<F>(
    config: &Config,
    options: RunOptions,
    mut on_tick: F,
) -> AutoscaleResult<AutoscalerStats>
where
    F: FnMut(&TickReport, &InMemoryPoolRegistry),
{
    let registry = InMemoryPoolRegistry::new_shared();
    let cloud = Arc::new(SimulatedCloud::new(
        registry.clone(),
        &config.kinds,
        config.autoscaler.tick_period,
        options.capacity,
    ));
    cloud.bootstrap();

    let mut autoscaler = AutoscalerLoop::new(
        config.autoscaler.policy.clone(),
        registry.clone(),
        cloud.clone(),
        cloud.clone(),
    )?;

    let period = if options.realtime {
        config.autoscaler.tick_period
    } else {
        Duration::from_millis(1)
    };
    let mut interval = tokio::time::interval(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut fires = 0u64;
    loop {
        if options.ticks.is_some_and(|limit| fires >= limit) {
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                fires += 1;
                cloud.advance(fires);
                let report = autoscaler.tick(fires)?;
                on_tick(&report, &registry);
            }
            _ = &mut shutdown => {
                tracing::info!("Autoscaler shutting down");
                break;
            }
        }
    }

    tracing::info!(
        ticks = fires,
        live_workers = cloud.live_workers(),
        "Autoscaler stopped"
    );

    Ok(autoscaler.stats())
}

fn print_tick(report: &TickReport) {
    let mut line = format!("tick {:>5} │", report.tick);
    for kind in &report.kinds {
        let target = kind
            .target
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let utilization = kind
            .utilization
            .map(|u| format!("{:>5.1}%", u * 100.0))
            .unwrap_or_else(|| "     -".to_string());
        line.push_str(&format!(
            " {} {}/{} {} {}",
            kind.kind,
            kind.pool_size,
            target,
            utilization,
            kind.growth.name()
        ));
        if kind.requested > 0 {
            line.push_str(&format!(" +{}", kind.requested));
        }
        if kind.destroyed > 0 {
            line.push_str(&format!(" -{}", kind.destroyed));
        }
        line.push_str(" │");
    }
    for failure in &report.failures {
        line.push_str(&format!(" ✗ {}", failure));
    }
    println!("{}", line);
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
autoscaler:
  profile: pool_tracking
  tick_period_secs: 120
kinds:
  - id: batch
    initial_workers: 0
    demand:
      - { from_tick: 0, load: 5.0 }
  - id: render
    initial_workers: 1
"#;

    fn options(ticks: u64, capacity: Option<usize>) -> RunOptions {
        RunOptions {
            ticks: Some(ticks),
            realtime: false,
            capacity,
            json: false,
        }
    }

    #[tokio::test]
    async fn test_simulation_runs_requested_ticks() {
        let config = ConfigLoader::load_string(CONFIG).unwrap();
        let mut seen = Vec::new();

        let stats = simulate(&config, options(5, None), |report, _| seen.push(report.tick))
            .await
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.ticks, 5);
        // Both kinds were seeded on the first tick.
        assert!(stats.requested >= 6);
    }

    #[tokio::test]
    async fn test_loaded_kind_grows_past_seed() {
        let config = ConfigLoader::load_string(CONFIG).unwrap();
        let mut batch_sizes = Vec::new();

        let batch = config.kinds[0].id.clone();

        simulate(&config, options(20, None), |_, registry| {
            if let Ok(workers) = registry.workers(&batch) {
                batch_sizes.push(workers.len());
            }
        })
        .await
        .unwrap();

        assert!(batch_sizes.iter().any(|&n| n > 3), "sizes: {:?}", batch_sizes);
    }

    #[tokio::test]
    async fn test_capacity_failures_are_reported_not_fatal() {
        let config = ConfigLoader::load_string(CONFIG).unwrap();
        let mut failures = 0;

        let stats = simulate(&config, options(10, Some(2)), |report, _| {
            failures += report.failures.len();
        })
        .await
        .unwrap();

        assert_eq!(stats.ticks, 10);
        assert!(failures > 0);
        assert_eq!(stats.failures, failures as u64);
    }
}
