// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `poolscale validate` command - Validate configuration file.

use poolscale_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let policy = &config.autoscaler.policy;
            let on_off = |flag: bool| if flag { "on" } else { "off" };

            println!("✓ Configuration is valid");
            println!();
            println!("Autoscaler Settings:");
            println!("  Profile:            {}", policy.profile.name());
            println!(
                "  Tick Period:        {}s",
                config.autoscaler.tick_period.as_secs()
            );
            println!("  Pool Tracking:      {}", on_off(policy.pool_tracking));
            println!("  Seed Pool Size:     {}", policy.seed_pool_size);
            println!(
                "  Thresholds:         min {:.2} / low {:.2} / high {:.2}",
                policy.min_utilization, policy.low_threshold, policy.high_threshold
            );
            println!(
                "  Grace (ticks):      singleton {} / at-target {} / general {}",
                policy.singleton_grace, policy.at_target_grace, policy.generic_grace
            );
            println!(
                "  Skip Growth After Destruction: {}",
                on_off(policy.skip_growth_after_destruction)
            );
            println!();
            println!("Kinds ({}):", config.kinds.len());
            for kind in &config.kinds {
                println!(
                    "  - {} (initial workers: {}, demand phases: {})",
                    kind.id,
                    kind.initial_workers,
                    kind.demand.len()
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
