//! Queue provider trait for pluggable distributed queue backends.

use async_trait::async_trait;

use chartjob_core::result::AppResult;

use crate::model::{FinishedJob, JobCounts, JobOutcome, NewQueueJob, QueuedJob};

/// Trait for distributed work queues (Redis or in-memory).
///
/// `queue` arguments are concrete queue names, already resolved from the
/// logical names used in configuration.
#[async_trait]
pub trait QueueProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Add one job to a queue.
    async fn add(&self, queue: &str, job: NewQueueJob) -> AppResult<QueuedJob>;

    /// Add several jobs to a queue, preserving their order.
    async fn add_bulk(&self, queue: &str, jobs: Vec<NewQueueJob>) -> AppResult<Vec<QueuedJob>>;

    /// Wait until a worker reports the job as completed or failed.
    ///
    /// Returns immediately if the job already finished. Has no timeout of
    /// its own; callers race it against their deadline.
    async fn wait_until_finished(&self, queue: &str, job_id: &str) -> AppResult<JobOutcome>;

    /// Mark a job so that workers never retry it.
    async fn discard(&self, queue: &str, job_id: &str) -> AppResult<()>;

    /// Whether the queue is paused. Also serves as the connectivity probe.
    async fn is_paused(&self, queue: &str) -> AppResult<bool>;

    /// Number of workers with a recent heartbeat.
    async fn worker_count(&self, queue: &str) -> AppResult<u64>;

    /// Number of active and waiting jobs.
    async fn job_counts(&self, queue: &str) -> AppResult<JobCounts>;

    /// Up to `limit` most recently finished (completed or failed) jobs,
    /// newest first.
    async fn finished_jobs(&self, queue: &str, limit: usize) -> AppResult<Vec<FinishedJob>>;
}
