//! In-memory job store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use chartjob_core::error::AppError;
use chartjob_core::result::AppResult;
use chartjob_entity::job::model::{CreateJob, JobRecord};
use chartjob_entity::job::status::JobStatus;

use crate::store::JobStore;

/// Job store backed by a [`DashMap`].
///
/// The worker side is played through [`start`](Self::start),
/// [`finish`](Self::finish) and [`fail`](Self::fail).
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<DashMap<Uuid, JobRecord>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, as a lost database would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of a stored job.
    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.get(&id).map(|job| job.value().clone())
    }

    /// All stored jobs, oldest first.
    pub fn all(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self.jobs.iter().map(|job| job.value().clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Move a job back in time, as if it had been created `age` ago.
    pub fn backdate(&self, id: Uuid, age: Duration) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.created_at = Utc::now() - age;
        }
    }

    /// Worker side: claim a job.
    pub fn start(&self, id: Uuid) {
        self.set_status(id, JobStatus::InProgress);
    }

    /// Worker side: complete a job.
    pub fn finish(&self, id: Uuid) {
        self.set_status(id, JobStatus::Done);
    }

    /// Worker side: give up on a job.
    pub fn fail(&self, id: Uuid) {
        self.set_status(id, JobStatus::Failed);
    }

    fn set_status(&self, id: Uuid, status: JobStatus) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = status;
            if status.is_terminal() {
                job.done_at = Some(Utc::now());
            }
        }
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AppError::database("Database unavailable"))
        } else {
            Ok(())
        }
    }

    fn record(data: &CreateJob) -> JobRecord {
        JobRecord {
            id: Uuid::new_v4(),
            key: data.key.clone(),
            priority: data.priority,
            chart_id: data.chart_id.clone(),
            user_id: data.user_id,
            tasks: data.tasks.clone(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            done_at: None,
        }
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut JobRecord)) -> AppResult<()> {
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))?;
        apply(&mut job);
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<JobRecord>> {
        self.ensure_available()?;
        Ok(self.get(id))
    }

    async fn create(&self, data: &CreateJob) -> AppResult<JobRecord> {
        self.ensure_available()?;
        let record = Self::record(data);
        self.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn bulk_create(&self, data: &[CreateJob]) -> AppResult<Vec<JobRecord>> {
        self.ensure_available()?;
        let records: Vec<JobRecord> = data.iter().map(Self::record).collect();
        for record in &records {
            self.jobs.insert(record.id, record.clone());
        }
        Ok(records)
    }

    async fn set_priority(&self, id: Uuid, priority: i32) -> AppResult<()> {
        self.ensure_available()?;
        self.update(id, |job| job.priority = priority)
    }

    async fn mark_done(&self, id: Uuid) -> AppResult<()> {
        self.ensure_available()?;
        self.update(id, |job| {
            job.status = JobStatus::Done;
            job.done_at = Some(Utc::now());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartjob_entity::job::task::Task;

    fn invalidate() -> CreateJob {
        CreateJob {
            key: "cloudflare".into(),
            priority: 0,
            chart_id: Some("abc12".into()),
            user_id: None,
            tasks: vec![Task::CloudflareInvalidate {
                urls: vec!["https://charts.example.com/abc12/".into()],
            }],
        }
    }

    #[tokio::test]
    async fn test_create_starts_queued() {
        let store = MemoryJobStore::new();
        let job = store.create(&invalidate()).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.done_at.is_none());
        assert_eq!(store.find_by_id(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn test_mark_done_overrides_status() {
        let store = MemoryJobStore::new();
        let job = store.create(&invalidate()).await.unwrap();
        store.start(job.id);
        store.mark_done(job.id).await.unwrap();

        let job = store.get(job.id).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.done_at.is_some());
    }

    #[tokio::test]
    async fn test_set_priority_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store.set_priority(Uuid::new_v4(), -1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryJobStore::new();
        store.set_unavailable(true);
        assert!(store.create(&invalidate()).await.is_err());
    }
}
