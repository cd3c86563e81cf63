//! Chart export command.

use anyhow::Context;
use clap::Args;

use chartjob_core::config::AppConfig;
use chartjob_entity::export::ExportRequest;
use chartjob_scheduler::ScheduleOptions;

use crate::context::{build_scheduler, deadline};

/// Arguments for `export`
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Export request as JSON, or `@path` to read it from a file
    #[arg(long)]
    pub request: String,
    /// Job priority
    #[arg(long, default_value_t = 0)]
    pub priority: i32,
    /// Wait for the export, giving up after this many seconds in the queue
    #[arg(long, value_name = "SECONDS")]
    pub wait: Option<u64>,
}

/// Compile and schedule the export, optionally waiting for it.
pub async fn execute(args: &ExportArgs, config: &AppConfig) -> anyhow::Result<()> {
    let request = read_request(&args.request).await?;
    let scheduler = build_scheduler(config).await?;

    let handle = scheduler
        .schedule_export(&request, ScheduleOptions::with_priority(args.priority))
        .await?;
    println!(
        "Scheduled export job {} for chart {} ({})",
        handle.job().id(),
        request.chart_id,
        handle.backend_name()
    );

    if args.wait.is_some() {
        handle.get_result(deadline(args.wait)).await?;
        println!("Export finished");
    }
    Ok(())
}

async fn read_request(source: &str) -> anyhow::Result<ExportRequest> {
    let json = match source.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path}"))?,
        None => source.to_string(),
    };
    serde_json::from_str(&json).context("Invalid export request")
}
