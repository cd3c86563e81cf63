//! Queue health command.

use clap::Args;

use chartjob_core::config::AppConfig;

use super::print_json;
use crate::context::build_scheduler;

/// Arguments for `health`
#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Logical queue name
    pub queue: String,
    /// Number of finished jobs to sample (defaults to `scheduler.health_sample_size`)
    #[arg(long)]
    pub sample: Option<usize>,
}

/// Print the queue's health report as JSON.
pub async fn execute(args: &HealthArgs, config: &AppConfig) -> anyhow::Result<()> {
    let scheduler = build_scheduler(config).await?;
    let sample = args.sample.unwrap_or(config.scheduler.health_sample_size);
    let health = scheduler.get_queue_health(&args.queue, sample).await?;
    print_json(&health)
}
