//! CDN cache purge command.

use clap::Args;

use chartjob_core::config::AppConfig;
use chartjob_entity::export::InvalidateRequest;
use chartjob_scheduler::ScheduleOptions;

use crate::context::{build_scheduler, deadline};

/// Arguments for `invalidate`
#[derive(Debug, Args)]
pub struct InvalidateArgs {
    /// Chart whose URLs are purged
    #[arg(long)]
    pub chart: String,
    /// Requesting user
    #[arg(long)]
    pub user: Option<i64>,
    /// URL to purge (repeatable)
    #[arg(long = "url", required = true)]
    pub urls: Vec<String>,
    /// Job priority
    #[arg(long, default_value_t = 0)]
    pub priority: i32,
    /// Wait for the purge, giving up after this many seconds in the queue
    #[arg(long, value_name = "SECONDS")]
    pub wait: Option<u64>,
}

/// Schedule the purge and optionally wait for it.
pub async fn execute(args: &InvalidateArgs, config: &AppConfig) -> anyhow::Result<()> {
    let scheduler = build_scheduler(config).await?;
    let request = InvalidateRequest {
        chart_id: Some(args.chart.clone()),
        user_id: args.user,
        urls: args.urls.clone(),
    };

    let handle = scheduler
        .schedule_invalidate_cloudflare_job(&request, ScheduleOptions::with_priority(args.priority))
        .await?;
    println!(
        "Scheduled purge job {} ({})",
        handle.job().id(),
        handle.backend_name()
    );

    if args.wait.is_some() {
        handle.get_result(deadline(args.wait)).await?;
        println!("Purge finished");
    }
    Ok(())
}
