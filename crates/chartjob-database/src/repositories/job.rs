//! Export job repository, the storage of the relational backend.

use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use chartjob_core::error::{AppError, ErrorKind};
use chartjob_core::result::AppResult;
use chartjob_entity::job::model::{CreateJob, JobRecord};
use chartjob_entity::job::status::JobStatus;

const INSERT_JOB: &str = "INSERT INTO export_jobs (key, priority, chart_id, user_id, tasks, status) \
     VALUES ($1, $2, $3, $4, $5, $6) RETURNING *";

/// Repository for the `export_jobs` table.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        sqlx::query_as::<_, JobRecord>("SELECT * FROM export_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    /// Insert a new job with status `queued`.
    pub async fn create(&self, data: &CreateJob) -> AppResult<JobRecord> {
        sqlx::query_as::<_, JobRecord>(INSERT_JOB)
            .bind(&data.key)
            .bind(data.priority)
            .bind(&data.chart_id)
            .bind(data.user_id)
            .bind(Json(&data.tasks))
            .bind(JobStatus::Queued)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    /// Insert several jobs in one transaction, preserving input order.
    pub async fn bulk_create(&self, data: &[CreateJob]) -> AppResult<Vec<JobRecord>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let mut jobs = Vec::with_capacity(data.len());
        for job in data {
            let record = sqlx::query_as::<_, JobRecord>(INSERT_JOB)
                .bind(&job.key)
                .bind(job.priority)
                .bind(&job.chart_id)
                .bind(job.user_id)
                .bind(Json(&job.tasks))
                .bind(JobStatus::Queued)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to create job", e)
                })?;
            jobs.push(record);
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit job batch", e)
        })?;
        Ok(jobs)
    }

    /// Overwrite a job's priority.
    pub async fn set_priority(&self, id: Uuid, priority: i32) -> AppResult<()> {
        sqlx::query("UPDATE export_jobs SET priority = $2 WHERE id = $1")
            .bind(id)
            .bind(priority)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update job priority", e)
            })?;
        Ok(())
    }

    /// Force a job to `done` and stamp `done_at`, regardless of its current status.
    pub async fn mark_done(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE export_jobs SET status = $2, done_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(JobStatus::Done)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark job as done", e)
            })?;
        Ok(())
    }
}
