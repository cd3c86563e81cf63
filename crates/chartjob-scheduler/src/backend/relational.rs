//! Relational backend: job records polled until they settle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use uuid::Uuid;

use chartjob_core::error::AppError;
use chartjob_database::store::JobStore;
use chartjob_entity::job::model::{ABANDONED_PRIORITY, CreateJob};
use chartjob_entity::job::status::JobStatus;

use super::{JobBackend, JobRef, JobSpec, ScheduleOptions, WorkerJob};
use crate::error::{JobCompletionError, SchedulerError};

/// Deadline position at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineState {
    /// Waiting without a deadline.
    Unbounded,
    /// The deadline is still ahead.
    Pending,
    /// The job has been around for at least the deadline.
    Passed,
}

/// What a poll decides after reloading the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// The job is done.
    Succeeded,
    /// The worker failed the job.
    Failed,
    /// Still queued past the deadline: force `done` and give up.
    TimedOut,
    /// Running under a deadline: drop the priority so the job is never
    /// retried, then keep waiting.
    Downgrade,
    /// Sleep and poll again.
    Wait,
}

/// Pure transition function of the polling loop.
pub fn next_step(status: JobStatus, priority: i32, deadline: DeadlineState) -> PollStep {
    match (status, deadline) {
        (JobStatus::Done, _) => PollStep::Succeeded,
        (JobStatus::Failed, _) => PollStep::Failed,
        (JobStatus::Queued, DeadlineState::Passed) => PollStep::TimedOut,
        (JobStatus::InProgress, DeadlineState::Pending | DeadlineState::Passed)
            if priority >= 0 =>
        {
            PollStep::Downgrade
        }
        _ => PollStep::Wait,
    }
}

/// Backend storing jobs as rows of the job table.
#[derive(Debug, Clone)]
pub struct RelationalBackend {
    store: Arc<dyn JobStore>,
    poll_interval: Duration,
}

impl RelationalBackend {
    /// Create a relational backend polling every `poll_interval`.
    pub fn new(store: Arc<dyn JobStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    fn to_create(job: WorkerJob, options: &ScheduleOptions) -> Result<CreateJob, SchedulerError> {
        let spec: JobSpec = match job {
            WorkerJob::Tasks(spec) => spec,
            WorkerJob::ExportChart { .. } => {
                return Err(AppError::validation(
                    "Chart exports with access tokens need a distributed queue",
                )
                .into());
            }
        };
        Ok(CreateJob {
            key: options
                .key
                .clone()
                .unwrap_or_else(|| spec.default_key().to_string()),
            priority: options.priority,
            chart_id: spec.chart_id.clone(),
            user_id: spec.user_id,
            tasks: spec.into_tasks(),
        })
    }

    async fn poll(&self, id: Uuid, max_in_queue: Option<Duration>, initial_age: Duration)
    -> Result<(), SchedulerError> {
        let started = Instant::now();

        loop {
            let record = self
                .store
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))?;

            let deadline = match max_in_queue {
                None => DeadlineState::Unbounded,
                Some(max) if initial_age + started.elapsed() >= max => DeadlineState::Passed,
                Some(_) => DeadlineState::Pending,
            };

            match next_step(record.status, record.priority, deadline) {
                PollStep::Succeeded => {
                    tracing::debug!(job_id = %id, "Job done");
                    return Ok(());
                }
                PollStep::Failed => {
                    tracing::debug!(job_id = %id, "Job failed");
                    return Err(
                        JobCompletionError::failed(id.to_string(), "worker failed the job").into(),
                    );
                }
                PollStep::TimedOut => {
                    // The record is left `done` so no worker picks it up later.
                    self.store.mark_done(id).await?;
                    let max = max_in_queue.unwrap_or_default();
                    tracing::warn!(
                        job_id = %id,
                        max_in_queue_secs = max.as_secs_f64(),
                        "Job still queued at deadline, forced to done"
                    );
                    return Err(JobCompletionError::timeout(
                        id.to_string(),
                        format!("still queued after {}s", max.as_secs_f64()),
                    )
                    .into());
                }
                PollStep::Downgrade => {
                    self.store.set_priority(id, ABANDONED_PRIORITY).await?;
                    tracing::info!(job_id = %id, "Job running under a deadline, priority dropped");
                }
                PollStep::Wait => {}
            }

            time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl JobBackend for RelationalBackend {
    fn name(&self) -> &'static str {
        "relational"
    }

    async fn schedule(
        &self,
        queue: &str,
        job: WorkerJob,
        options: &ScheduleOptions,
    ) -> Result<JobRef, SchedulerError> {
        let data = Self::to_create(job, options)?;
        let record = self.store.create(&data).await?;
        tracing::debug!(
            queue,
            job_id = %record.id,
            key = %record.key,
            priority = record.priority,
            "Created job record"
        );
        Ok(JobRef::Relational {
            id: record.id,
            created_at: record.created_at,
        })
    }

    async fn schedule_bulk(
        &self,
        queue: &str,
        jobs: Vec<WorkerJob>,
        options: &ScheduleOptions,
    ) -> Result<Vec<JobRef>, SchedulerError> {
        let data = jobs
            .into_iter()
            .map(|job| Self::to_create(job, options))
            .collect::<Result<Vec<_>, _>>()?;
        let records = self.store.bulk_create(&data).await?;
        tracing::debug!(queue, count = records.len(), "Created job records");
        Ok(records
            .into_iter()
            .map(|record| JobRef::Relational {
                id: record.id,
                created_at: record.created_at,
            })
            .collect())
    }

    async fn wait(
        &self,
        job: &JobRef,
        max_in_queue: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        match job {
            JobRef::Relational { id, .. } => self.poll(*id, max_in_queue, job.age()).await,
            JobRef::Distributed { queue, .. } => Err(AppError::internal(format!(
                "Job on distributed queue '{queue}' handed to the relational backend"
            ))
            .into()),
        }
    }
}
