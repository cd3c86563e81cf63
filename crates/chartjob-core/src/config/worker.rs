//! Distributed queue (worker) configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Distributed work queue configuration.
///
/// Every field is optional at the deserialization level so that a partially
/// written section can be reported precisely instead of failing with a
/// generic parse error. The scheduler validates the section when it builds
/// the distributed backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Redis connection parameters.
    #[serde(default)]
    pub connection: Option<QueueConnectionConfig>,
    /// Logical queue name (`compute`, `render`) to Redis queue name.
    #[serde(default)]
    pub queues: BTreeMap<String, String>,
    /// Prefix applied to every queue key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// A worker whose last heartbeat is older than this is not counted as alive.
    #[serde(default = "default_heartbeat")]
    pub worker_heartbeat_seconds: u64,
}

/// Redis connection parameters for the distributed queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConnectionConfig {
    /// Redis host name.
    #[serde(default)]
    pub host: Option<String>,
    /// Redis port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Optional Redis password.
    #[serde(default)]
    pub password: Option<String>,
    /// Redis logical database index.
    #[serde(default)]
    pub db: i64,
}

fn default_key_prefix() -> String {
    "chartjob".to_string()
}

fn default_heartbeat() -> u64 {
    30
}
