//! Value types exchanged with a queue provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A job to enqueue: the worker dispatches on `name` and reads `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueJob {
    /// Job type, e.g. `exportChart`.
    pub name: String,
    /// Payload whose schema depends on `name`.
    pub data: Value,
    /// Scheduling hint for the workers.
    pub priority: i32,
}

/// A job accepted by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Queue the job was added to.
    pub queue: String,
    /// Queue-assigned job identifier.
    pub id: String,
    /// Job type.
    pub name: String,
    /// When the job was added.
    pub timestamp: DateTime<Utc>,
}

/// Terminal outcome reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The worker finished the job, with its return value.
    Completed(Value),
    /// The worker gave up on the job.
    Failed(String),
}

/// Event published by workers on a queue's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    /// Job the event refers to.
    pub job_id: String,
    /// What happened.
    pub event: QueueEventKind,
    /// Return value for `completed` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returnvalue: Option<Value>,
    /// Failure reason for `failed` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
}

impl QueueEvent {
    /// Outcome carried by this event, if it is terminal.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.event {
            QueueEventKind::Completed => Some(JobOutcome::Completed(
                self.returnvalue.clone().unwrap_or(Value::Null),
            )),
            QueueEventKind::Failed => Some(JobOutcome::Failed(
                self.failed_reason
                    .clone()
                    .unwrap_or_else(|| "job failed".to_string()),
            )),
            QueueEventKind::Active | QueueEventKind::Progress => None,
        }
    }
}

/// Kinds of queue events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEventKind {
    /// A worker picked the job up.
    Active,
    /// A worker reported progress.
    Progress,
    /// The job finished successfully.
    Completed,
    /// The job failed.
    Failed,
}

/// Number of jobs being worked on and waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    /// Jobs claimed by a worker.
    pub active: u64,
    /// Jobs waiting for a worker.
    pub waiting: u64,
}

/// A job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedJob {
    /// Job identifier.
    pub id: String,
    /// When the job finished.
    pub finished_on: DateTime<Utc>,
    /// `true` if it completed, `false` if it failed.
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_event_outcome() {
        let event: QueueEvent = serde_json::from_value(json!({
            "jobId": "42",
            "event": "failed",
            "failedReason": "renderer crashed"
        }))
        .unwrap();
        assert_eq!(
            event.outcome(),
            Some(JobOutcome::Failed("renderer crashed".to_string()))
        );
    }

    #[test]
    fn test_progress_event_is_not_terminal() {
        let event: QueueEvent =
            serde_json::from_value(json!({"jobId": "42", "event": "progress"})).unwrap();
        assert_eq!(event.outcome(), None);
    }
}
