//! Distributed backend: jobs on a work queue, completion from the queue's
//! event stream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use chartjob_core::error::AppError;
use chartjob_entity::export::{ChartExportJob, ExportEntry, UploadOptions};
use chartjob_entity::job::Task;
use chartjob_queue::{JobOutcome, NewQueueJob, QueueProvider};

use super::{JobBackend, JobRef, ScheduleOptions, WorkerJob};
use crate::error::{JobCompletionError, SchedulerError};

/// Job type names understood by the workers.
pub mod job_names {
    /// Render and upload a chart with an access token.
    pub const EXPORT_CHART: &str = "exportChart";
    /// Purge CDN caches.
    pub const INVALIDATE_CLOUDFLARE_CACHE: &str = "invalidateCloudflareCache";
    /// Run a compiled task list.
    pub const RUN_TASKS: &str = "runTasks";
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportChartData<'a> {
    access_token: &'a str,
    chart_id: &'a str,
    exports: &'a [ExportEntry],
    upload: &'a Option<UploadOptions>,
}

/// Queue payload for a job.
pub fn to_queue_job(job: &WorkerJob, priority: i32) -> Result<NewQueueJob, SchedulerError> {
    let (name, data) = match job {
        WorkerJob::ExportChart { access_token, job } => {
            (job_names::EXPORT_CHART, export_chart_data(access_token, job)?)
        }
        WorkerJob::Tasks(spec) => match spec.tasks() {
            [Task::CloudflareInvalidate { urls }] => {
                (job_names::INVALIDATE_CLOUDFLARE_CACHE, json!({ "urls": urls }))
            }
            tasks => {
                let tasks = serde_json::to_value(tasks).map_err(AppError::from)?;
                (
                    job_names::RUN_TASKS,
                    json!({
                        "chartId": spec.chart_id,
                        "userId": spec.user_id,
                        "tasks": tasks,
                    }),
                )
            }
        },
    };
    Ok(NewQueueJob {
        name: name.to_string(),
        data,
        priority,
    })
}

fn export_chart_data(access_token: &str, job: &ChartExportJob) -> Result<Value, SchedulerError> {
    let data = ExportChartData {
        access_token,
        chart_id: &job.chart_id,
        exports: &job.exports,
        upload: &job.upload,
    };
    Ok(serde_json::to_value(data).map_err(AppError::from)?)
}

/// Backend enqueuing jobs on a [`QueueProvider`].
#[derive(Debug, Clone)]
pub struct DistributedBackend {
    provider: Arc<dyn QueueProvider>,
    /// Logical queue name to concrete queue name.
    queues: BTreeMap<String, String>,
}

impl DistributedBackend {
    /// Create a distributed backend serving the given queues.
    pub fn new(provider: Arc<dyn QueueProvider>, queues: BTreeMap<String, String>) -> Self {
        Self { provider, queues }
    }

    /// Whether a logical queue is registered.
    pub fn has_queue(&self, queue: &str) -> bool {
        self.queues.contains_key(queue)
    }

    /// Concrete name of a logical queue.
    pub fn resolve(&self, queue: &str) -> Result<&str, SchedulerError> {
        self.queues
            .get(queue)
            .map(String::as_str)
            .ok_or_else(|| SchedulerError::UnsupportedQueue(queue.to_string()))
    }

    /// The underlying queue provider.
    pub fn provider(&self) -> &Arc<dyn QueueProvider> {
        &self.provider
    }

    async fn await_outcome(
        &self,
        queue: &str,
        id: &str,
        max_in_queue: Option<Duration>,
        age: Duration,
    ) -> Result<(), SchedulerError> {
        let finished = self.provider.wait_until_finished(queue, id);
        let outcome = match max_in_queue {
            None => finished.await,
            Some(max) => {
                let ttl = max.saturating_sub(age);
                match tokio::time::timeout(ttl, finished).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(JobCompletionError::timeout(
                            id,
                            format!("not finished within {}s", max.as_secs_f64()),
                        )
                        .into());
                    }
                }
            }
        };

        match outcome {
            Ok(JobOutcome::Completed(_)) => Ok(()),
            Ok(JobOutcome::Failed(reason)) => Err(JobCompletionError::failed(id, reason).into()),
            Err(e) => Err(JobCompletionError::failed(id, e.to_string()).into()),
        }
    }

    fn discard_in_background(&self, queue: &str, id: &str) {
        let provider = Arc::clone(&self.provider);
        let queue = queue.to_string();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = provider.discard(&queue, &id).await {
                tracing::warn!(queue = %queue, job_id = %id, error = %e, "Failed to discard job");
            }
        });
    }
}

#[async_trait]
impl JobBackend for DistributedBackend {
    fn name(&self) -> &'static str {
        "distributed"
    }

    async fn schedule(
        &self,
        queue: &str,
        job: WorkerJob,
        options: &ScheduleOptions,
    ) -> Result<JobRef, SchedulerError> {
        let concrete = self.resolve(queue)?;
        let queued = self
            .provider
            .add(concrete, to_queue_job(&job, options.priority)?)
            .await?;
        tracing::debug!(queue = concrete, job_id = %queued.id, name = %queued.name, "Enqueued job");
        Ok(JobRef::Distributed {
            queue: queued.queue,
            id: queued.id,
            created_at: queued.timestamp,
        })
    }

    async fn schedule_bulk(
        &self,
        queue: &str,
        jobs: Vec<WorkerJob>,
        options: &ScheduleOptions,
    ) -> Result<Vec<JobRef>, SchedulerError> {
        let concrete = self.resolve(queue)?;
        let payloads = jobs
            .iter()
            .map(|job| to_queue_job(job, options.priority))
            .collect::<Result<Vec<_>, _>>()?;
        let queued = self.provider.add_bulk(concrete, payloads).await?;
        tracing::debug!(queue = concrete, count = queued.len(), "Enqueued jobs");
        Ok(queued
            .into_iter()
            .map(|queued| JobRef::Distributed {
                queue: queued.queue,
                id: queued.id,
                created_at: queued.timestamp,
            })
            .collect())
    }

    async fn wait(
        &self,
        job: &JobRef,
        max_in_queue: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        let JobRef::Distributed { queue, id, .. } = job else {
            return Err(AppError::internal(format!(
                "Job {} handed to the distributed backend is not a queue job",
                job.id()
            ))
            .into());
        };

        let result = self.await_outcome(queue, id, max_in_queue, job.age()).await;
        if let Err(e) = &result {
            tracing::debug!(queue = %queue, job_id = %id, error = %e, "Discarding unfinished job");
            self.discard_in_background(queue, id);
        }
        result
    }
}
