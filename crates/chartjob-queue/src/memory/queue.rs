//! In-process queue provider.
//!
//! Jobs are kept in a [`DashMap`] and events travel over a tokio broadcast
//! channel. The worker side of the protocol ([`MemoryQueue::start`],
//! [`MemoryQueue::complete`], [`MemoryQueue::fail`], heartbeats, pausing)
//! is exposed directly so tests and local runs can play the worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use chartjob_core::error::AppError;
use chartjob_core::result::AppResult;

use crate::model::{
    FinishedJob, JobCounts, JobOutcome, NewQueueJob, QueueEvent, QueueEventKind, QueuedJob,
};
use crate::provider::QueueProvider;

const EVENT_CAPACITY: usize = 256;

/// Lifecycle of a job in the in-memory queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryJobState {
    /// Waiting for a worker.
    Waiting,
    /// Claimed by a worker.
    Active,
    /// Finished successfully.
    Completed,
    /// Failed.
    Failed,
}

/// A job stored in the in-memory queue.
#[derive(Debug, Clone)]
pub struct MemoryJob {
    /// Job as it was enqueued.
    pub job: NewQueueJob,
    /// Current state.
    pub state: MemoryJobState,
    /// When it was enqueued.
    pub timestamp: DateTime<Utc>,
    /// When it finished.
    pub finished_on: Option<DateTime<Utc>>,
    /// Terminal outcome.
    pub outcome: Option<JobOutcome>,
    /// Whether a waiter asked for the job to be dropped.
    pub discarded: bool,
}

#[derive(Debug)]
struct Inner {
    next_id: AtomicU64,
    jobs: DashMap<(String, String), MemoryJob>,
    paused: DashMap<String, bool>,
    workers: DashMap<String, u64>,
    events: broadcast::Sender<(String, QueueEvent)>,
    connected: AtomicBool,
}

/// In-memory queue provider.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    /// Create an empty, connected queue.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                jobs: DashMap::new(),
                paused: DashMap::new(),
                workers: DashMap::new(),
                events,
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate losing (or regaining) the connection to the queue.
    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    /// Pause or resume a queue.
    pub fn set_paused(&self, queue: &str, paused: bool) {
        self.inner.paused.insert(queue.to_string(), paused);
    }

    /// Set the number of live workers of a queue.
    pub fn set_workers(&self, queue: &str, count: u64) {
        self.inner.workers.insert(queue.to_string(), count);
    }

    /// Snapshot of a stored job.
    pub fn job(&self, queue: &str, job_id: &str) -> Option<MemoryJob> {
        self.inner
            .jobs
            .get(&(queue.to_string(), job_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Worker side: claim a job.
    pub fn start(&self, queue: &str, job_id: &str) -> AppResult<()> {
        self.transition(queue, job_id, MemoryJobState::Active, None)?;
        self.publish(queue, job_id, QueueEventKind::Active, None, None);
        Ok(())
    }

    /// Worker side: finish a job successfully.
    pub fn complete(&self, queue: &str, job_id: &str, returnvalue: Value) -> AppResult<()> {
        self.transition(
            queue,
            job_id,
            MemoryJobState::Completed,
            Some(JobOutcome::Completed(returnvalue.clone())),
        )?;
        self.publish(
            queue,
            job_id,
            QueueEventKind::Completed,
            Some(returnvalue),
            None,
        );
        Ok(())
    }

    /// Worker side: fail a job.
    pub fn fail(&self, queue: &str, job_id: &str, reason: &str) -> AppResult<()> {
        self.transition(
            queue,
            job_id,
            MemoryJobState::Failed,
            Some(JobOutcome::Failed(reason.to_string())),
        )?;
        self.publish(
            queue,
            job_id,
            QueueEventKind::Failed,
            None,
            Some(reason.to_string()),
        );
        Ok(())
    }

    fn ensure_connected(&self) -> AppResult<()> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::service_unavailable("Queue connection refused"))
        }
    }

    fn transition(
        &self,
        queue: &str,
        job_id: &str,
        state: MemoryJobState,
        outcome: Option<JobOutcome>,
    ) -> AppResult<()> {
        let mut entry = self
            .inner
            .jobs
            .get_mut(&(queue.to_string(), job_id.to_string()))
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found in '{queue}'")))?;
        entry.state = state;
        if outcome.is_some() {
            entry.finished_on = Some(Utc::now());
            entry.outcome = outcome;
        }
        Ok(())
    }

    fn publish(
        &self,
        queue: &str,
        job_id: &str,
        event: QueueEventKind,
        returnvalue: Option<Value>,
        failed_reason: Option<String>,
    ) {
        // No receivers simply means nobody is waiting.
        let _ = self.inner.events.send((
            queue.to_string(),
            QueueEvent {
                job_id: job_id.to_string(),
                event,
                returnvalue,
                failed_reason,
            },
        ));
    }

    fn recorded_outcome(&self, queue: &str, job_id: &str) -> AppResult<Option<JobOutcome>> {
        self.job(queue, job_id)
            .map(|job| job.outcome)
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found in '{queue}'")))
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueProvider for MemoryQueue {
    async fn add(&self, queue: &str, job: NewQueueJob) -> AppResult<QueuedJob> {
        self.ensure_connected()?;
        let id = (self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let timestamp = Utc::now();
        let queued = QueuedJob {
            queue: queue.to_string(),
            id: id.clone(),
            name: job.name.clone(),
            timestamp,
        };
        self.inner.jobs.insert(
            (queue.to_string(), id),
            MemoryJob {
                job,
                state: MemoryJobState::Waiting,
                timestamp,
                finished_on: None,
                outcome: None,
                discarded: false,
            },
        );
        debug!(queue, job_id = %queued.id, "Enqueued in-memory job");
        Ok(queued)
    }

    async fn add_bulk(&self, queue: &str, jobs: Vec<NewQueueJob>) -> AppResult<Vec<QueuedJob>> {
        let mut queued = Vec::with_capacity(jobs.len());
        for job in jobs {
            queued.push(self.add(queue, job).await?);
        }
        Ok(queued)
    }

    async fn wait_until_finished(&self, queue: &str, job_id: &str) -> AppResult<JobOutcome> {
        let mut events = self.inner.events.subscribe();
        self.ensure_connected()?;

        if let Some(outcome) = self.recorded_outcome(queue, job_id)? {
            return Ok(outcome);
        }

        loop {
            match events.recv().await {
                Ok((event_queue, event)) => {
                    if event_queue != queue || event.job_id != job_id {
                        continue;
                    }
                    if let Some(outcome) = event.outcome() {
                        return Ok(outcome);
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    if let Some(outcome) = self.recorded_outcome(queue, job_id)? {
                        return Ok(outcome);
                    }
                }
                Err(RecvError::Closed) => {
                    return Err(AppError::service_unavailable(format!(
                        "Event stream of queue '{queue}' closed before job {job_id} finished"
                    )));
                }
            }
        }
    }

    async fn discard(&self, queue: &str, job_id: &str) -> AppResult<()> {
        self.ensure_connected()?;
        let mut entry = self
            .inner
            .jobs
            .get_mut(&(queue.to_string(), job_id.to_string()))
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found in '{queue}'")))?;
        entry.discarded = true;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> AppResult<bool> {
        self.ensure_connected()?;
        Ok(self
            .inner
            .paused
            .get(queue)
            .map(|paused| *paused)
            .unwrap_or(false))
    }

    async fn worker_count(&self, queue: &str) -> AppResult<u64> {
        self.ensure_connected()?;
        Ok(self
            .inner
            .workers
            .get(queue)
            .map(|count| *count)
            .unwrap_or(0))
    }

    async fn job_counts(&self, queue: &str) -> AppResult<JobCounts> {
        self.ensure_connected()?;
        let mut counts = JobCounts::default();
        for entry in self.inner.jobs.iter() {
            if entry.key().0 != queue {
                continue;
            }
            match entry.value().state {
                MemoryJobState::Active => counts.active += 1,
                MemoryJobState::Waiting => counts.waiting += 1,
                MemoryJobState::Completed | MemoryJobState::Failed => {}
            }
        }
        Ok(counts)
    }

    async fn finished_jobs(&self, queue: &str, limit: usize) -> AppResult<Vec<FinishedJob>> {
        self.ensure_connected()?;
        let mut finished: Vec<FinishedJob> = self
            .inner
            .jobs
            .iter()
            .filter(|entry| entry.key().0 == queue)
            .filter_map(|entry| {
                let job = entry.value();
                job.finished_on.map(|finished_on| FinishedJob {
                    id: entry.key().1.clone(),
                    finished_on,
                    completed: job.state == MemoryJobState::Completed,
                })
            })
            .collect();
        finished.sort_by(|a, b| b.finished_on.cmp(&a.finished_on));
        finished.truncate(limit);
        Ok(finished)
    }
}
