//! Queue health diagnostics.

use chrono::Utc;
use serde::Serialize;

use crate::error::SchedulerError;
use crate::scheduler::JobScheduler;

/// Point-in-time snapshot of a distributed queue.
///
/// Fields after `connected` are absent when an earlier probe failed or
/// short-circuited the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    /// The queue answered.
    pub connected: bool,
    /// The queue is paused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    /// Workers with a recent heartbeat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<u64>,
    /// No active and no waiting jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle: Option<bool>,
    /// Finished jobs in the sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_finished: Option<usize>,
    /// Milliseconds since the most recent finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_finished_ago_ms: Option<i64>,
    /// Completed (not failed) jobs in the sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_completed: Option<usize>,
    /// `num_finished / num_completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio_completed: Option<f64>,
}

impl JobScheduler {
    /// Probe a distributed queue.
    ///
    /// Fails only if the queue is not registered. Probe failures after the
    /// connection check end the report early.
    pub async fn get_queue_health(
        &self,
        queue: &str,
        sample_size: usize,
    ) -> Result<QueueHealth, SchedulerError> {
        let distributed = self.distributed_for(queue)?;
        let concrete = distributed.resolve(queue)?;
        let provider = distributed.provider();

        let paused = match provider.is_paused(concrete).await {
            Ok(paused) => paused,
            Err(e) => {
                tracing::warn!(queue = concrete, error = %e, "Queue unreachable");
                return Ok(QueueHealth::default());
            }
        };
        let mut health = QueueHealth {
            connected: true,
            paused: Some(paused),
            ..QueueHealth::default()
        };

        let num_workers = match provider.worker_count(concrete).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(queue = concrete, error = %e, "Failed to count workers");
                return Ok(health);
            }
        };
        health.num_workers = Some(num_workers);
        if num_workers == 0 {
            return Ok(health);
        }

        match provider.job_counts(concrete).await {
            Ok(counts) => health.idle = Some(counts.active == 0 && counts.waiting == 0),
            Err(e) => {
                tracing::warn!(queue = concrete, error = %e, "Failed to count jobs");
                return Ok(health);
            }
        }

        let finished = match provider.finished_jobs(concrete, sample_size).await {
            Ok(finished) => finished,
            Err(e) => {
                tracing::warn!(queue = concrete, error = %e, "Failed to sample finished jobs");
                return Ok(health);
            }
        };
        health.num_finished = Some(finished.len());
        if finished.is_empty() {
            return Ok(health);
        }

        if let Some(last) = finished.iter().map(|job| job.finished_on).max() {
            health.last_job_finished_ago_ms = Some((Utc::now() - last).num_milliseconds());
        }

        let num_completed = finished.iter().filter(|job| job.completed).count();
        health.num_completed = Some(num_completed);
        health.ratio_completed =
            (num_completed > 0).then(|| finished.len() as f64 / num_completed as f64);

        Ok(health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disconnected_report_shape() {
        let report = serde_json::to_value(QueueHealth::default()).unwrap();
        assert_eq!(report, json!({ "connected": false }));
    }

    #[test]
    fn test_no_workers_report_shape() {
        let report = QueueHealth {
            connected: true,
            paused: Some(false),
            num_workers: Some(0),
            ..QueueHealth::default()
        };
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({ "connected": true, "paused": false, "numWorkers": 0 })
        );
    }
}
