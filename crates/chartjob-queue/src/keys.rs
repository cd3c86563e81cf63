//! Redis key builders for the distributed queue.
//!
//! Centralising key construction keeps the layout shared with the workers
//! in one place. For a queue `q` under prefix `p`:
//!
//! | key | type | content |
//! |---|---|---|
//! | `p:q:id` | string | job id counter |
//! | `p:q:job:<id>` | hash | `name`, `data`, `priority`, `timestamp`, `state`, `finishedOn`, `failedReason`, `returnvalue`, `discarded` |
//! | `p:q:wait` | list | waiting job ids |
//! | `p:q:active` | list | job ids claimed by a worker |
//! | `p:q:completed` | zset | job ids scored by finish time (ms) |
//! | `p:q:failed` | zset | job ids scored by finish time (ms) |
//! | `p:q:meta` | hash | `paused` = `1` while paused |
//! | `p:q:workers` | zset | worker ids scored by last heartbeat (ms) |
//! | `p:q:events` | channel | JSON [`QueueEvent`](crate::model::QueueEvent) messages |

// ── Counters and jobs ──────────────────────────────────────

/// Job id counter.
pub fn id_counter(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:id")
}

/// Hash holding one job.
pub fn job(prefix: &str, queue: &str, job_id: &str) -> String {
    format!("{prefix}:{queue}:job:{job_id}")
}

// ── Job state collections ──────────────────────────────────

/// List of waiting job ids.
pub fn wait(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:wait")
}

/// List of active job ids.
pub fn active(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:active")
}

/// Sorted set of completed job ids.
pub fn completed(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:completed")
}

/// Sorted set of failed job ids.
pub fn failed(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:failed")
}

// ── Queue-level state ──────────────────────────────────────

/// Queue metadata hash.
pub fn meta(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:meta")
}

/// Worker heartbeat sorted set.
pub fn workers(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:workers")
}

/// Pub/sub channel carrying job events.
pub fn events(prefix: &str, queue: &str) -> String {
    format!("{prefix}:{queue}:events")
}
