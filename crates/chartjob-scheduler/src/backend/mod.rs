//! Job execution backends.
//!
//! A backend stores jobs where workers pick them up and knows how to wait
//! for them:
//!
//! - [`RelationalBackend`]: job records in the database, completion detected
//!   by polling
//! - [`DistributedBackend`]: jobs on a Redis work queue, completion detected
//!   from the queue's event stream

pub mod distributed;
pub mod relational;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use chartjob_core::error::AppError;
use chartjob_entity::export::ChartExportJob;
use chartjob_entity::job::Task;

use crate::error::SchedulerError;

pub use distributed::DistributedBackend;
pub use relational::RelationalBackend;

/// Compiled work: a non-empty, ordered task list and its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Owning chart.
    pub chart_id: Option<String>,
    /// Requesting user.
    pub user_id: Option<i64>,
    tasks: Vec<Task>,
}

impl JobSpec {
    /// Wrap a task list. Empty lists are rejected.
    pub fn new(tasks: Vec<Task>) -> Result<Self, SchedulerError> {
        if tasks.is_empty() {
            return Err(AppError::validation("A job needs at least one task").into());
        }
        Ok(Self {
            chart_id: None,
            user_id: None,
            tasks,
        })
    }

    /// Set the owning chart.
    pub fn with_chart(mut self, chart_id: impl Into<String>) -> Self {
        self.chart_id = Some(chart_id.into());
        self
    }

    /// Set the requesting user.
    pub fn with_user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Consume into the task list.
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Key stored with relational records when none is given.
    pub fn default_key(&self) -> &'static str {
        match self.tasks.as_slice() {
            [Task::CloudflareInvalidate { .. }] => "cloudflare",
            _ => "export",
        }
    }
}

/// Work handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerJob {
    /// Compiled tasks.
    Tasks(JobSpec),
    /// A chart export the worker renders and uploads itself, authorized by
    /// an export access token.
    ExportChart {
        /// Token the worker uses to read the chart.
        access_token: String,
        /// What to export.
        job: ChartExportJob,
    },
}

/// Per-call scheduling options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Scheduling hint; higher runs earlier.
    pub priority: i32,
    /// Key stored on relational records.
    pub key: Option<String>,
}

impl ScheduleOptions {
    /// Options with a priority.
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            key: None,
        }
    }
}

/// Reference to a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRef {
    /// A row of the job table.
    Relational {
        /// Record ID.
        id: Uuid,
        /// When the record was created.
        created_at: DateTime<Utc>,
    },
    /// A job on a distributed queue.
    Distributed {
        /// Concrete queue name.
        queue: String,
        /// Queue-assigned ID.
        id: String,
        /// When the job was enqueued.
        created_at: DateTime<Utc>,
    },
}

impl JobRef {
    /// Job ID as a string.
    pub fn id(&self) -> String {
        match self {
            Self::Relational { id, .. } => id.to_string(),
            Self::Distributed { id, .. } => id.clone(),
        }
    }

    /// When the job was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Relational { created_at, .. } | Self::Distributed { created_at, .. } => {
                *created_at
            }
        }
    }

    /// Time spent since creation. Zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at()).to_std().unwrap_or_default()
    }
}

/// A place to run jobs and a way to wait for them.
#[async_trait]
pub trait JobBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Schedule one job on a logical queue.
    async fn schedule(
        &self,
        queue: &str,
        job: WorkerJob,
        options: &ScheduleOptions,
    ) -> Result<JobRef, SchedulerError>;

    /// Schedule several jobs, in order.
    async fn schedule_bulk(
        &self,
        queue: &str,
        jobs: Vec<WorkerJob>,
        options: &ScheduleOptions,
    ) -> Result<Vec<JobRef>, SchedulerError>;

    /// Wait until the job succeeds or fails. With `max_in_queue`, give up
    /// once the job is older than that.
    async fn wait(&self, job: &JobRef, max_in_queue: Option<Duration>)
    -> Result<(), SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_rejects_empty() {
        assert!(matches!(
            JobSpec::new(Vec::new()),
            Err(SchedulerError::Internal(_))
        ));
    }

    #[test]
    fn test_default_key() {
        let invalidate = JobSpec::new(vec![Task::CloudflareInvalidate { urls: Vec::new() }])
            .unwrap()
            .with_chart("abc12");
        assert_eq!(invalidate.default_key(), "cloudflare");
        assert_eq!(invalidate.chart_id.as_deref(), Some("abc12"));

        let export = JobSpec::new(vec![Task::Compress {
            image: "a.png".into(),
        }])
        .unwrap();
        assert_eq!(export.default_key(), "export");
    }
}
