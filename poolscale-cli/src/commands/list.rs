// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `poolscale list` command - List workload kinds from configuration.

use poolscale_core::ConfigLoader;

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;

    if config.kinds.is_empty() {
        println!("No workload kinds defined in configuration.");
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                            CONFIGURED KINDS                                  ║");
    println!("╠═══════════════════╦════════════╦═══════════════════╦═════════════════════════╣");
    println!("║ Kind              ║ Initial    ║ Demand phases     ║ Peak load (workers)     ║");
    println!("╠═══════════════════╬════════════╬═══════════════════╬═════════════════════════╣");

    for kind in &config.kinds {
        let peak = kind
            .demand
            .iter()
            .map(|phase| phase.load)
            .fold(0.0_f64, f64::max);

        println!(
            "║ {:<17} ║ {:<10} ║ {:<17} ║ {:<23} ║",
            kind.id.as_str(),
            kind.initial_workers,
            kind.demand.len(),
            format!("{:.2}", peak)
        );
    }

    println!("╚═══════════════════╩════════════╩═══════════════════╩═════════════════════════╝");
    println!();
    println!(
        "Total: {} kind(s), profile {}",
        config.kinds.len(),
        config.autoscaler.policy.profile.name()
    );

    Ok(())
}
