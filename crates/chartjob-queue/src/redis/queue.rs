//! Redis-backed queue provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use redis::Pipeline;
use tracing::{debug, warn};

use chartjob_core::error::{AppError, ErrorKind};
use chartjob_core::result::AppResult;

use super::client::RedisClient;
use crate::keys;
use crate::model::{FinishedJob, JobCounts, JobOutcome, NewQueueJob, QueueEvent, QueuedJob};
use crate::provider::QueueProvider;

/// Queue provider storing jobs in Redis and listening to worker events
/// over pub/sub.
#[derive(Debug, Clone)]
pub struct RedisQueue {
    /// Redis client.
    client: RedisClient,
    /// Workers whose heartbeat is older than this are considered gone.
    heartbeat_ttl: Duration,
}

impl RedisQueue {
    /// Create a new Redis queue provider.
    pub fn new(client: RedisClient, heartbeat_ttl: Duration) -> Self {
        Self {
            client,
            heartbeat_ttl,
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Queue, format!("Redis error: {e}"), e)
    }

    /// Append the commands storing one waiting job to a pipeline.
    fn push_job(
        &self,
        pipe: &mut Pipeline,
        queue: &str,
        id: &str,
        job: &NewQueueJob,
        timestamp_ms: i64,
    ) -> AppResult<()> {
        let prefix = self.client.prefix();
        let data = serde_json::to_string(&job.data)?;
        pipe.cmd("HSET")
            .arg(keys::job(prefix, queue, id))
            .arg("name")
            .arg(&job.name)
            .arg("data")
            .arg(data)
            .arg("priority")
            .arg(job.priority)
            .arg("timestamp")
            .arg(timestamp_ms)
            .arg("state")
            .arg("waiting")
            .ignore()
            .cmd("LPUSH")
            .arg(keys::wait(prefix, queue))
            .arg(id)
            .ignore();
        Ok(())
    }

    /// Terminal outcome already recorded on the job hash, if any.
    async fn recorded_outcome(&self, queue: &str, job_id: &str) -> AppResult<Option<JobOutcome>> {
        let mut conn = self.client.conn_mut();
        let (state, failed_reason, returnvalue): (Option<String>, Option<String>, Option<String>) =
            redis::cmd("HMGET")
                .arg(keys::job(self.client.prefix(), queue, job_id))
                .arg("state")
                .arg("failedReason")
                .arg("returnvalue")
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

        match state.as_deref() {
            None => Err(AppError::not_found(format!(
                "Job {job_id} not found in queue '{queue}'"
            ))),
            Some("completed") => {
                let value = returnvalue
                    .as_deref()
                    .map(serde_json::from_str::<serde_json::Value>)
                    .transpose()?
                    .unwrap_or(serde_json::Value::Null);
                Ok(Some(JobOutcome::Completed(value)))
            }
            Some("failed") => Ok(Some(JobOutcome::Failed(
                failed_reason.unwrap_or_else(|| "job failed".to_string()),
            ))),
            Some(_) => Ok(None),
        }
    }

    /// Most recent members of a finished-jobs sorted set.
    async fn finished_from(
        &self,
        key: String,
        limit: usize,
        completed: bool,
    ) -> AppResult<Vec<FinishedJob>> {
        let mut conn = self.client.conn_mut();
        let entries: Vec<(String, f64)> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(0)
            .arg(limit as i64 - 1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(entries
            .into_iter()
            .filter_map(|(id, score)| {
                DateTime::<Utc>::from_timestamp_millis(score as i64).map(|finished_on| {
                    FinishedJob {
                        id,
                        finished_on,
                        completed,
                    }
                })
            })
            .collect())
    }
}

#[async_trait]
impl QueueProvider for RedisQueue {
    async fn add(&self, queue: &str, job: NewQueueJob) -> AppResult<QueuedJob> {
        let mut added = self.add_bulk(queue, vec![job]).await?;
        added
            .pop()
            .ok_or_else(|| AppError::internal("Queue accepted no job"))
    }

    async fn add_bulk(&self, queue: &str, jobs: Vec<NewQueueJob>) -> AppResult<Vec<QueuedJob>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.client.conn_mut();
        let last_id: u64 = redis::cmd("INCRBY")
            .arg(keys::id_counter(self.client.prefix(), queue))
            .arg(jobs.len())
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        let first_id = last_id + 1 - jobs.len() as u64;

        let now = Utc::now();
        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut queued = Vec::with_capacity(jobs.len());
        for (offset, job) in jobs.iter().enumerate() {
            let id = (first_id + offset as u64).to_string();
            self.push_job(&mut pipe, queue, &id, job, now.timestamp_millis())?;
            queued.push(QueuedJob {
                queue: queue.to_string(),
                id,
                name: job.name.clone(),
                timestamp: now,
            });
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(Self::map_err)?;

        debug!(queue, count = queued.len(), first_id, "Enqueued jobs");
        Ok(queued)
    }

    async fn wait_until_finished(&self, queue: &str, job_id: &str) -> AppResult<JobOutcome> {
        let mut pubsub = self.client.pubsub().await?;
        pubsub
            .subscribe(keys::events(self.client.prefix(), queue))
            .await
            .map_err(Self::map_err)?;

        // The job may have finished before the subscription was active.
        if let Some(outcome) = self.recorded_outcome(queue, job_id).await? {
            return Ok(outcome);
        }

        let mut messages = pubsub.on_message();
        while let Some(message) = messages.next().await {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(queue, error = %e, "Ignoring non-text queue event");
                    continue;
                }
            };
            let event: QueueEvent = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(queue, error = %e, "Ignoring malformed queue event");
                    continue;
                }
            };
            if event.job_id != job_id {
                continue;
            }
            if let Some(outcome) = event.outcome() {
                return Ok(outcome);
            }
        }

        Err(AppError::service_unavailable(format!(
            "Event stream of queue '{queue}' closed before job {job_id} finished"
        )))
    }

    async fn discard(&self, queue: &str, job_id: &str) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let _: () = redis::cmd("HSET")
            .arg(keys::job(self.client.prefix(), queue, job_id))
            .arg("discarded")
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        debug!(queue, job_id, "Discarded job");
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let paused: Option<String> = redis::cmd("HGET")
            .arg(keys::meta(self.client.prefix(), queue))
            .arg("paused")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(paused.as_deref() == Some("1"))
    }

    async fn worker_count(&self, queue: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        let oldest_alive = Utc::now().timestamp_millis() - self.heartbeat_ttl.as_millis() as i64;
        redis::cmd("ZCOUNT")
            .arg(keys::workers(self.client.prefix(), queue))
            .arg(oldest_alive)
            .arg("+inf")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)
    }

    async fn job_counts(&self, queue: &str) -> AppResult<JobCounts> {
        let prefix = self.client.prefix();
        let mut conn = self.client.conn_mut();
        let (active, waiting): (u64, u64) = redis::pipe()
            .cmd("LLEN")
            .arg(keys::active(prefix, queue))
            .cmd("LLEN")
            .arg(keys::wait(prefix, queue))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(JobCounts { active, waiting })
    }

    async fn finished_jobs(&self, queue: &str, limit: usize) -> AppResult<Vec<FinishedJob>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let prefix = self.client.prefix();
        let mut jobs = self
            .finished_from(keys::completed(prefix, queue), limit, true)
            .await?;
        jobs.extend(
            self.finished_from(keys::failed(prefix, queue), limit, false)
                .await?,
        );
        jobs.sort_by(|a, b| b.finished_on.cmp(&a.finished_on));
        jobs.truncate(limit);
        Ok(jobs)
    }
}
