//! Redis connection management.

use redis::Client;
use redis::aio::{ConnectionManager, PubSub};
use tracing::info;

use chartjob_core::config::mask_url_password;
use chartjob_core::error::{AppError, ErrorKind};
use chartjob_core::result::AppResult;

/// Where the distributed queue's Redis lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Optional password.
    pub password: Option<String>,
    /// Logical database index.
    pub db: i64,
}

impl RedisEndpoint {
    /// Connection URL for the endpoint.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{password}@{}:{}/{}",
                self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Redis client wrapper with a reconnecting connection manager.
#[derive(Clone)]
pub struct RedisClient {
    /// Client used to open dedicated pub/sub connections.
    client: Client,
    /// Shared command connection (pooled, reconnecting).
    conn: ConnectionManager,
    /// Prefix for all queue keys.
    key_prefix: String,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Connect to the queue's Redis.
    pub async fn connect(endpoint: &RedisEndpoint, key_prefix: &str) -> AppResult<Self> {
        let url = endpoint.url();
        info!(url = %mask_url_password(&url), "Connecting to queue Redis");

        let client = Client::open(url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to create Redis client", e)
        })?;

        let conn = ConnectionManager::new(client.clone()).await.map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to connect to Redis", e)
        })?;

        info!("Successfully connected to queue Redis");
        Ok(Self {
            client,
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Get a mutable clone of the connection manager.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Open a dedicated pub/sub connection.
    pub async fn pubsub(&self) -> AppResult<PubSub> {
        self.client.get_async_pubsub().await.map_err(|e| {
            AppError::with_source(ErrorKind::Queue, "Failed to open Redis pub/sub connection", e)
        })
    }

    /// Return the key prefix.
    pub fn prefix(&self) -> &str {
        &self.key_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let mut endpoint = RedisEndpoint {
            host: "redis.internal".into(),
            port: 6380,
            password: None,
            db: 2,
        };
        assert_eq!(endpoint.url(), "redis://redis.internal:6380/2");

        endpoint.password = Some("hunter2".into());
        assert_eq!(endpoint.url(), "redis://:hunter2@redis.internal:6380/2");
    }
}
