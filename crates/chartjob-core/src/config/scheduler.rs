//! Scheduling and completion waiting configuration.

use serde::{Deserialize, Serialize};

/// Settings for the dual-backend scheduler and its completion waiters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between reloads of a relational job record, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Number of finished jobs sampled by the queue health monitor.
    #[serde(default = "default_sample_size")]
    pub health_sample_size: usize,
    /// Logical queue used for chart exports.
    #[serde(default = "default_export_queue")]
    pub export_queue: String,
    /// Logical queue used for CDN cache invalidation.
    #[serde(default = "default_invalidate_queue")]
    pub invalidate_queue: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            health_sample_size: default_sample_size(),
            export_queue: default_export_queue(),
            invalidate_queue: default_invalidate_queue(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_sample_size() -> usize {
    100
}

fn default_export_queue() -> String {
    "render".to_string()
}

fn default_invalidate_queue() -> String {
    "compute".to_string()
}
