//! Builds the scheduler from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use chartjob_core::config::AppConfig;
use chartjob_database::DatabasePool;
use chartjob_database::repositories::{ExportTokenRepository, JobRepository};
use chartjob_queue::redis::{RedisClient, RedisEndpoint, RedisQueue};
use chartjob_scheduler::{JobScheduler, WorkerSettings};

/// Connect to PostgreSQL.
pub async fn connect_database(config: &AppConfig) -> anyhow::Result<DatabasePool> {
    let db = DatabasePool::connect(&config.database)
        .await
        .context("Database connection failed")?;
    anyhow::ensure!(db.health_check().await?, "Database health check failed");
    Ok(db)
}

/// Scheduler over the job table, plus the distributed queue when the
/// worker section is present.
pub async fn build_scheduler(config: &AppConfig) -> anyhow::Result<JobScheduler> {
    let db = connect_database(config).await?;
    let pool = db.pool().clone();

    let scheduler = JobScheduler::new(
        Arc::new(JobRepository::new(pool.clone())),
        Arc::new(ExportTokenRepository::new(pool)),
        config.scheduler.clone(),
    );

    let Some(worker) = &config.worker else {
        tracing::info!("No worker section, every queue uses the job table");
        return Ok(scheduler);
    };

    let settings = WorkerSettings::from_config(worker)?;
    let endpoint = RedisEndpoint {
        host: settings.host.clone(),
        port: settings.port,
        password: settings.password.clone(),
        db: settings.db,
    };
    let client = RedisClient::connect(&endpoint, &settings.key_prefix)
        .await
        .context("Queue connection failed")?;
    let queue = RedisQueue::new(client, settings.heartbeat);

    tracing::info!(
        queues = ?settings.queues.keys().collect::<Vec<_>>(),
        "Distributed queue configured"
    );
    Ok(scheduler.with_distributed(Arc::new(queue), settings.queues)?)
}

/// Deadline argument in seconds.
pub fn deadline(seconds: Option<u64>) -> Option<Duration> {
    seconds.map(Duration::from_secs)
}
