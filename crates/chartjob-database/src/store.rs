//! Storage traits used by the job scheduler.

use async_trait::async_trait;
use uuid::Uuid;

use chartjob_core::result::AppResult;
use chartjob_entity::job::model::{CreateJob, JobRecord};
use chartjob_entity::token::ExportToken;

use crate::repositories::{ExportTokenRepository, JobRepository};

/// Persistent job records polled by the relational backend.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch a job by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobRecord>>;

    /// Insert one job with status `queued`.
    async fn create(&self, data: &CreateJob) -> AppResult<JobRecord>;

    /// Insert several jobs atomically, in input order.
    async fn bulk_create(&self, data: &[CreateJob]) -> AppResult<Vec<JobRecord>>;

    /// Overwrite a job's priority.
    async fn set_priority(&self, id: Uuid, priority: i32) -> AppResult<()>;

    /// Force a job to `done`.
    async fn mark_done(&self, id: Uuid) -> AppResult<()>;
}

/// Issuing and revoking export access tokens.
#[async_trait]
pub trait ExportTokenStore: Send + Sync + std::fmt::Debug + 'static {
    /// Issue a token for a chart and user.
    async fn create(&self, chart_id: &str, user_id: i64) -> AppResult<ExportToken>;

    /// Revoke a token. Returns whether it existed.
    async fn destroy(&self, token: &str) -> AppResult<bool>;
}

#[async_trait]
impl JobStore for JobRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        JobRepository::find_by_id(self, id).await
    }

    async fn create(&self, data: &CreateJob) -> AppResult<JobRecord> {
        JobRepository::create(self, data).await
    }

    async fn bulk_create(&self, data: &[CreateJob]) -> AppResult<Vec<JobRecord>> {
        JobRepository::bulk_create(self, data).await
    }

    async fn set_priority(&self, id: Uuid, priority: i32) -> AppResult<()> {
        JobRepository::set_priority(self, id, priority).await
    }

    async fn mark_done(&self, id: Uuid) -> AppResult<()> {
        JobRepository::mark_done(self, id).await
    }
}

#[async_trait]
impl ExportTokenStore for ExportTokenRepository {
    async fn create(&self, chart_id: &str, user_id: i64) -> AppResult<ExportToken> {
        ExportTokenRepository::create(self, chart_id, user_id).await
    }

    async fn destroy(&self, token: &str) -> AppResult<bool> {
        ExportTokenRepository::destroy(self, token).await
    }
}
