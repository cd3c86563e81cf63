//! Shared test helpers for scheduler integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use chartjob_core::config::SchedulerConfig;
use chartjob_database::memory::{MemoryJobStore, MemoryTokenStore};
use chartjob_entity::export::{ExportEntry, InvalidateRequest};
use chartjob_queue::memory::MemoryQueue;
use chartjob_scheduler::{JobRef, JobScheduler};

/// Scheduler wired to in-memory stores and queue. The test plays the
/// worker pool through `jobs` and `queue`.
pub struct TestApp {
    /// Scheduler under test
    pub scheduler: JobScheduler,
    /// Relational job store
    pub jobs: MemoryJobStore,
    /// Issued export tokens
    pub tokens: MemoryTokenStore,
    /// Distributed queue
    pub queue: MemoryQueue,
}

impl TestApp {
    /// Job table only.
    pub fn relational() -> Self {
        let jobs = MemoryJobStore::new();
        let tokens = MemoryTokenStore::new();
        let scheduler = JobScheduler::new(
            Arc::new(jobs.clone()),
            Arc::new(tokens.clone()),
            SchedulerConfig::default(),
        );
        Self {
            scheduler,
            jobs,
            tokens,
            queue: MemoryQueue::new(),
        }
    }

    /// Distributed queue serving the given logical queues, each mapped to
    /// `dw-<name>`.
    pub fn distributed(queues: &[&str]) -> Self {
        let mut app = Self::relational();
        let queues: BTreeMap<String, String> = queues
            .iter()
            .map(|name| (name.to_string(), concrete(name)))
            .collect();
        app.scheduler = app
            .scheduler
            .with_distributed(Arc::new(app.queue.clone()), queues)
            .unwrap();
        app
    }
}

/// Concrete queue name used for a logical queue.
pub fn concrete(queue: &str) -> String {
    format!("dw-{queue}")
}

/// Queue and job ID of a distributed job.
pub fn queue_job(job: &JobRef) -> (String, String) {
    match job {
        JobRef::Distributed { queue, id, .. } => (queue.clone(), id.clone()),
        other => panic!("expected a distributed job, got {other:?}"),
    }
}

/// Record ID of a relational job.
pub fn record_id(job: &JobRef) -> Uuid {
    match job {
        JobRef::Relational { id, .. } => *id,
        other => panic!("expected a relational job, got {other:?}"),
    }
}

/// Export entry without post-processing.
pub fn entry(format: &str, filename: &str) -> ExportEntry {
    ExportEntry {
        format: format.into(),
        filename: filename.into(),
        options: Map::new(),
        border: None,
        compress: false,
        exif: None,
    }
}

/// Cache purge for one chart.
pub fn invalidate(chart_id: &str) -> InvalidateRequest {
    InvalidateRequest {
        chart_id: Some(chart_id.into()),
        user_id: Some(7),
        urls: vec![format!("https://charts.example.com/{chart_id}/")],
    }
}
