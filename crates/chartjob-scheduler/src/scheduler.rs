//! Dual-backend job scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use chartjob_core::config::SchedulerConfig;
use chartjob_core::result::AppResult;
use chartjob_database::store::{ExportTokenStore, JobStore};
use chartjob_entity::export::{ExportRequest, InvalidateRequest, S3Target, SaveOptions};
use chartjob_queue::QueueProvider;

use crate::backend::{
    DistributedBackend, JobBackend, JobRef, JobSpec, RelationalBackend, ScheduleOptions,
    WorkerJob,
};
use crate::compiler;
use crate::error::SchedulerError;

/// Looks up custom storage configured for the team owning a chart.
#[async_trait]
pub trait UploadTargetResolver: Send + Sync + std::fmt::Debug + 'static {
    /// S3 target for the chart, if its team has one.
    async fn resolve(&self, chart_id: &str, user_id: Option<i64>) -> AppResult<Option<S3Target>>;
}

/// A scheduled job that can be waited for.
#[derive(Debug, Clone)]
pub struct JobHandle {
    backend: Arc<dyn JobBackend>,
    job: JobRef,
}

impl JobHandle {
    pub(crate) fn new(backend: Arc<dyn JobBackend>, job: JobRef) -> Self {
        Self { backend, job }
    }

    /// The scheduled job.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// Name of the backend holding the job.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Wait for the job. With `max_in_queue`, fail with a timeout once the
    /// job is older than that.
    pub async fn get_result(&self, max_in_queue: Option<Duration>) -> Result<(), SchedulerError> {
        self.backend.wait(&self.job, max_in_queue).await
    }
}

/// Several jobs scheduled together.
#[derive(Debug, Clone)]
pub struct BulkJobHandle {
    handles: Vec<JobHandle>,
}

impl BulkJobHandle {
    /// Individual handles, in scheduling order.
    pub fn handles(&self) -> &[JobHandle] {
        &self.handles
    }

    /// One independent result future per job, in scheduling order.
    pub fn get_results(
        &self,
        max_in_queue: Option<Duration>,
    ) -> Vec<BoxFuture<'static, Result<(), SchedulerError>>> {
        self.handles
            .iter()
            .cloned()
            .map(|handle| -> BoxFuture<'static, Result<(), SchedulerError>> {
                Box::pin(async move { handle.get_result(max_in_queue).await })
            })
            .collect()
    }
}

/// Schedules jobs on the distributed queue when it serves the requested
/// queue, on the job table otherwise.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    pub(crate) relational: Arc<RelationalBackend>,
    pub(crate) distributed: Option<Arc<DistributedBackend>>,
    pub(crate) tokens: Arc<dyn ExportTokenStore>,
    pub(crate) upload_resolver: Option<Arc<dyn UploadTargetResolver>>,
    pub(crate) config: SchedulerConfig,
}

impl JobScheduler {
    /// Create a scheduler backed by the job table only.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tokens: Arc<dyn ExportTokenStore>,
        config: SchedulerConfig,
    ) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        Self {
            relational: Arc::new(RelationalBackend::new(jobs, poll_interval)),
            distributed: None,
            tokens,
            upload_resolver: None,
            config,
        }
    }

    /// Serve the given logical queues from a distributed queue. The queue
    /// map must name at least one queue.
    pub fn with_distributed(
        mut self,
        provider: Arc<dyn QueueProvider>,
        queues: BTreeMap<String, String>,
    ) -> Result<Self, SchedulerError> {
        if queues.is_empty() {
            return Err(SchedulerError::MissingWorkerConfig(
                "no distributed queues are mapped".to_string(),
            ));
        }
        self.distributed = Some(Arc::new(DistributedBackend::new(provider, queues)));
        Ok(self)
    }

    /// Fill missing upload targets from team storage.
    pub fn with_upload_resolver(mut self, resolver: Arc<dyn UploadTargetResolver>) -> Self {
        self.upload_resolver = Some(resolver);
        self
    }

    /// Scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Backend serving a logical queue. Decided on every call.
    pub fn backend_for(&self, queue: &str) -> Arc<dyn JobBackend> {
        match &self.distributed {
            Some(distributed) if distributed.has_queue(queue) => {
                Arc::clone(distributed) as Arc<dyn JobBackend>
            }
            _ => Arc::clone(&self.relational) as Arc<dyn JobBackend>,
        }
    }

    /// The distributed backend, if it serves `queue`.
    pub(crate) fn distributed_for(
        &self,
        queue: &str,
    ) -> Result<&Arc<DistributedBackend>, SchedulerError> {
        self.distributed
            .as_ref()
            .filter(|distributed| distributed.has_queue(queue))
            .ok_or_else(|| SchedulerError::UnsupportedQueue(queue.to_string()))
    }

    /// Schedule one task list.
    pub async fn schedule_job(
        &self,
        queue: &str,
        job: JobSpec,
        options: ScheduleOptions,
    ) -> Result<JobHandle, SchedulerError> {
        let backend = self.backend_for(queue);
        let job = backend
            .schedule(queue, WorkerJob::Tasks(job), &options)
            .await?;
        tracing::info!(queue, backend = backend.name(), job_id = %job.id(), "Scheduled job");
        Ok(JobHandle::new(backend, job))
    }

    /// Schedule several task lists with the same options.
    pub async fn schedule_jobs(
        &self,
        queue: &str,
        jobs: Vec<JobSpec>,
        options: ScheduleOptions,
    ) -> Result<Vec<JobHandle>, SchedulerError> {
        let backend = self.backend_for(queue);
        let jobs = jobs.into_iter().map(WorkerJob::Tasks).collect();
        let refs = backend.schedule_bulk(queue, jobs, &options).await?;
        tracing::info!(queue, backend = backend.name(), count = refs.len(), "Scheduled jobs");
        Ok(refs
            .into_iter()
            .map(|job| JobHandle::new(Arc::clone(&backend), job))
            .collect())
    }

    /// Schedule a CDN cache purge on the invalidation queue.
    pub async fn schedule_invalidate_cloudflare_job(
        &self,
        request: &InvalidateRequest,
        options: ScheduleOptions,
    ) -> Result<JobHandle, SchedulerError> {
        let queue = self.config.invalidate_queue.clone();
        self.schedule_job(&queue, invalidate_spec(request)?, options)
            .await
    }

    /// Schedule several CDN cache purges at once.
    pub async fn schedule_invalidate_cloudflare_jobs(
        &self,
        requests: &[InvalidateRequest],
        options: ScheduleOptions,
    ) -> Result<BulkJobHandle, SchedulerError> {
        let specs = requests
            .iter()
            .map(invalidate_spec)
            .collect::<Result<Vec<_>, _>>()?;
        let queue = self.config.invalidate_queue.clone();
        let handles = self.schedule_jobs(&queue, specs, options).await?;
        Ok(BulkJobHandle { handles })
    }

    /// Compile an export request and schedule its tasks on the export queue.
    pub async fn schedule_export(
        &self,
        request: &ExportRequest,
        options: ScheduleOptions,
    ) -> Result<JobHandle, SchedulerError> {
        let mut request = request.clone();
        if request.s3_target().is_none() {
            if let Some(target) = self
                .resolve_upload_target(&request.chart_id, request.user_id)
                .await?
            {
                request
                    .save
                    .get_or_insert_with(SaveOptions::default)
                    .s3 = Some(target);
            }
        }

        let tasks = compiler::compile_export(&request)?;
        let spec = JobSpec::new(tasks)?
            .with_chart(request.chart_id.clone())
            .with_user(request.user_id);
        let queue = self.config.export_queue.clone();
        self.schedule_job(&queue, spec, options).await
    }

    pub(crate) async fn resolve_upload_target(
        &self,
        chart_id: &str,
        user_id: Option<i64>,
    ) -> Result<Option<S3Target>, SchedulerError> {
        match &self.upload_resolver {
            Some(resolver) => Ok(resolver.resolve(chart_id, user_id).await?),
            None => Ok(None),
        }
    }
}

fn invalidate_spec(request: &InvalidateRequest) -> Result<JobSpec, SchedulerError> {
    let mut spec = JobSpec::new(compiler::compile_invalidate(request))?.with_user(request.user_id);
    if let Some(chart_id) = &request.chart_id {
        spec = spec.with_chart(chart_id.clone());
    }
    Ok(spec)
}
