//! CLI command definitions and dispatch.

pub mod export;
pub mod health;
pub mod invalidate;
pub mod migrate;

use clap::{Parser, Subcommand};

use chartjob_core::config::AppConfig;

/// Chart export and cache invalidation jobs
#[derive(Debug, Parser)]
#[command(name = "chartjob", version, about, long_about = None)]
pub struct Cli {
    /// Configuration overlay to load (`config/<env>.toml`)
    #[arg(short, long, env = "CHARTJOB_ENV", default_value = "development")]
    pub env: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Purge a chart's CDN cache
    Invalidate(invalidate::InvalidateArgs),
    /// Export a chart
    Export(export::ExportArgs),
    /// Report the health of a distributed queue
    Health(health::HealthArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> anyhow::Result<()> {
        match &self.command {
            Commands::Migrate => migrate::execute(&config).await,
            Commands::Invalidate(args) => invalidate::execute(args, &config).await,
            Commands::Export(args) => export::execute(args, &config).await,
            Commands::Health(args) => health::execute(args, &config).await,
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
