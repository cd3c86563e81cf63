//! Validation of the distributed queue configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use chartjob_core::config::WorkerConfig;

use crate::error::SchedulerError;

/// A complete distributed queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Redis password.
    pub password: Option<String>,
    /// Redis database index.
    pub db: i64,
    /// Logical queue name to Redis queue name; never empty.
    pub queues: BTreeMap<String, String>,
    /// Key prefix.
    pub key_prefix: String,
    /// Worker liveness window.
    pub heartbeat: Duration,
}

impl WorkerSettings {
    /// Validate a worker section. Host, port and at least one queue are
    /// required.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, SchedulerError> {
        let connection = config.connection.as_ref().ok_or_else(|| {
            SchedulerError::MissingWorkerConfig("worker.connection is not set".to_string())
        })?;

        let host = connection
            .host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                SchedulerError::MissingWorkerConfig("worker.connection.host is not set".to_string())
            })?;

        let port = connection.port.ok_or_else(|| {
            SchedulerError::MissingWorkerConfig("worker.connection.port is not set".to_string())
        })?;

        if config.queues.is_empty() {
            return Err(SchedulerError::MissingWorkerConfig(
                "worker.queues is empty".to_string(),
            ));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            password: connection.password.clone(),
            db: connection.db,
            queues: config.queues.clone(),
            key_prefix: config.key_prefix.clone(),
            heartbeat: Duration::from_secs(config.worker_heartbeat_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartjob_core::config::QueueConnectionConfig;

    fn complete() -> WorkerConfig {
        WorkerConfig {
            connection: Some(QueueConnectionConfig {
                host: Some("redis.internal".into()),
                port: Some(6379),
                password: None,
                db: 2,
            }),
            queues: BTreeMap::from([("render".to_string(), "dw-render".to_string())]),
            key_prefix: "dw".into(),
            worker_heartbeat_seconds: 15,
        }
    }

    #[test]
    fn test_complete_section() {
        let settings = WorkerSettings::from_config(&complete()).unwrap();
        assert_eq!(settings.host, "redis.internal");
        assert_eq!(settings.db, 2);
        assert_eq!(settings.heartbeat, Duration::from_secs(15));
        assert_eq!(settings.queues["render"], "dw-render");
    }

    #[test]
    fn test_missing_port() {
        let mut config = complete();
        if let Some(connection) = config.connection.as_mut() {
            connection.port = None;
        }
        let err = WorkerSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, SchedulerError::MissingWorkerConfig(msg) if msg.contains("port")));
    }

    #[test]
    fn test_blank_host_and_empty_queues() {
        let mut config = complete();
        if let Some(connection) = config.connection.as_mut() {
            connection.host = Some("  ".into());
        }
        assert!(WorkerSettings::from_config(&config).is_err());

        let mut config = complete();
        config.queues.clear();
        assert!(matches!(
            WorkerSettings::from_config(&config),
            Err(SchedulerError::MissingWorkerConfig(_))
        ));
    }
}
