//! Export job record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::JobStatus;
use super::task::Task;

/// Priority a waiter assigns to a job it has stopped waiting for. Workers
/// never reschedule a job with a negative priority after a failure.
pub const ABANDONED_PRIORITY: i32 = -1;

/// A row of the relational export job table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: Uuid,
    /// Job kind key (e.g. `"export"`, `"cloudflare"`).
    pub key: String,
    /// Scheduling hint; higher runs earlier, negative means never retry.
    pub priority: i32,
    /// Chart the job belongs to.
    pub chart_id: Option<String>,
    /// User who requested the job.
    pub user_id: Option<i64>,
    /// Tasks in execution order.
    #[sqlx(json)]
    pub tasks: Vec<Task>,
    /// Current status.
    pub status: JobStatus,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job reached `done` or `failed`.
    pub done_at: Option<DateTime<Utc>>,
}

/// Data required to insert a new job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJob {
    /// Job kind key.
    pub key: String,
    /// Scheduling priority.
    pub priority: i32,
    /// Owning chart.
    pub chart_id: Option<String>,
    /// Requesting user.
    pub user_id: Option<i64>,
    /// Tasks in execution order; never empty.
    pub tasks: Vec<Task>,
}
