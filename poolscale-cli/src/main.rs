// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! poolscale CLI
//!
//! Command-line interface for the poolscale worker-pool autoscaler.

use clap::{Parser, Subcommand};

mod commands;
mod metrics;
mod simulator;

/// poolscale - Reactive autoscaler for pools of workers
#[derive(Parser)]
#[command(name = "poolscale")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "poolscale.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive the autoscaler against a simulated cloud
    Run {
        /// Stop after this many ticks (default: 720, or unbounded with --realtime)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Wait the configured tick period between ticks
        #[arg(long)]
        realtime: bool,

        /// Serve Prometheus metrics on this port
        #[arg(long)]
        metrics_port: Option<u16>,

        /// Print one JSON report per tick
        #[arg(long)]
        json: bool,

        /// Maximum live workers the simulated cloud will provision
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// List configured workload kinds
    List,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            ticks,
            realtime,
            metrics_port,
            json,
            capacity,
        } => {
            let options = commands::run::RunOptions {
                ticks: ticks.or(if realtime { None } else { Some(720) }),
                realtime,
                capacity,
                json,
            };
            commands::run::execute(&cli.config, options, metrics_port).await
        }
        Commands::List => commands::list::execute(&cli.config).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}
