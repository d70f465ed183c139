//! Provisioning Daemon - background provisioning service
//!
//! The daemon provides:
//! - Queue processor driving provisioning jobs with bounded concurrency
//! - Activation scheduler promoting scheduled jobs when due
//! - Optional periodic retention sweeps
//! - Lifecycle event logging

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod server;
mod simulate;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;
use simulate::SimulationOptions;

/// Provisioning Daemon CLI
#[derive(Parser)]
#[command(name = "provisiond")]
#[command(about = "Provisioning Daemon - workflow provisioning orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PROVISION_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "PROVISION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PROVISION_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon until interrupted (default)
    Run,

    /// Submit random requests, drive them to completion and print statistics
    Simulate {
        /// Number of requests to submit
        #[arg(short, long, default_value_t = 20)]
        jobs: usize,

        /// Probability that a simulated stage fails
        #[arg(long)]
        failure_rate: Option<f64>,

        /// Probability that a request omits a required field
        #[arg(long, default_value_t = 0.1)]
        invalid_rate: f64,

        /// Probability that the owner cancels right after submitting
        #[arg(long, default_value_t = 0.1)]
        cancel_rate: f64,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let server = Server::new(config)?;
            server.run().await
        }
        Command::Simulate {
            jobs,
            failure_rate,
            invalid_rate,
            cancel_rate,
            seed,
        } => {
            if let Some(rate) = failure_rate {
                config.executor.failure_rate = rate;
            }
            let options = SimulationOptions {
                jobs,
                invalid_rate,
                cancel_rate,
                seed,
                ..Default::default()
            };
            let report = simulate::run(config, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
