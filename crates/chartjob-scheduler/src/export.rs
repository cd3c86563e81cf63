//! Chart exports run by distributed export workers, authorized by a
//! short-lived access token.
//!
//! The token is issued before the job is enqueued and revoked exactly once:
//! when the result settles, when enqueueing fails, or in the background if
//! the handle is dropped unresolved.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use chartjob_core::error::AppError;
use chartjob_database::store::ExportTokenStore;
use chartjob_entity::export::{ChartExportJob, ExportFormat, UploadOptions};

use crate::backend::{JobBackend, ScheduleOptions, WorkerJob};
use crate::error::SchedulerError;
use crate::scheduler::{JobHandle, JobScheduler};

/// Owns an issued export token and revokes it at most once.
#[derive(Debug)]
pub struct TokenGuard {
    store: Arc<dyn ExportTokenStore>,
    token: Option<String>,
}

impl TokenGuard {
    /// Guard an issued token.
    pub fn new(store: Arc<dyn ExportTokenStore>, token: String) -> Self {
        Self {
            store,
            token: Some(token),
        }
    }

    /// The token, until released.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Revoke the token now. Later calls do nothing.
    pub async fn release(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        revoke(self.store.as_ref(), &token).await;
    }
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move { revoke(store.as_ref(), &token).await });
            }
            Err(_) => {
                tracing::warn!("Export token dropped outside a runtime, left for expiry");
            }
        }
    }
}

async fn revoke(store: &dyn ExportTokenStore, token: &str) {
    match store.destroy(token).await {
        Ok(existed) => tracing::debug!(existed, "Revoked export token"),
        Err(e) => tracing::error!(error = %e, "Failed to revoke export token"),
    }
}

/// A scheduled chart export and the token it runs with.
#[derive(Debug)]
pub struct ChartExportHandle {
    job: JobHandle,
    guard: TokenGuard,
}

impl ChartExportHandle {
    /// The underlying job.
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    /// Wait for the export, then revoke its token whatever the outcome.
    pub async fn get_result(
        mut self,
        max_in_queue: Option<Duration>,
    ) -> Result<(), SchedulerError> {
        let result = self.job.get_result(max_in_queue).await;
        self.guard.release().await;
        result
    }
}

impl JobScheduler {
    /// Schedule an `exportChart` job on the export queue.
    ///
    /// The export queue must be served by the distributed backend.
    pub async fn schedule_chart_export(
        &self,
        mut job: ChartExportJob,
        options: ScheduleOptions,
    ) -> Result<ChartExportHandle, SchedulerError> {
        if job.exports.is_empty() {
            return Err(AppError::validation("A chart export needs at least one entry").into());
        }
        if let Some(entry) = job
            .exports
            .iter()
            .find(|entry| entry.format.parse::<ExportFormat>().is_err())
        {
            return Err(SchedulerError::UnsupportedFormat(entry.format.clone()));
        }

        let queue = self.config.export_queue.clone();
        let backend = Arc::clone(self.distributed_for(&queue)?);

        if job.upload.as_ref().and_then(|upload| upload.s3.as_ref()).is_none() {
            if let Some(target) = self
                .resolve_upload_target(&job.chart_id, Some(job.user_id))
                .await?
            {
                job.upload = Some(UploadOptions { s3: Some(target) });
            }
        }

        let token = self.tokens.create(&job.chart_id, job.user_id).await?;
        let mut guard = TokenGuard::new(Arc::clone(&self.tokens), token.token.clone());
        tracing::debug!(chart_id = %job.chart_id, user_id = job.user_id, "Issued export token");

        let payload = WorkerJob::ExportChart {
            access_token: token.token,
            job,
        };
        match backend.schedule(&queue, payload, &options).await {
            Ok(job_ref) => {
                tracing::info!(queue = %queue, job_id = %job_ref.id(), "Scheduled chart export");
                Ok(ChartExportHandle {
                    job: JobHandle::new(backend, job_ref),
                    guard,
                })
            }
            Err(e) => {
                guard.release().await;
                Err(e)
            }
        }
    }
}
