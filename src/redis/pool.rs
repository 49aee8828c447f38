//! Shared Redis connection for directory lookups.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// Connection not available
    #[error("Connection not available: {0}")]
    ConnectionUnavailable(String),
}

/// Lazily connected multiplexed Redis connection.
///
/// The connection is established on first use and dropped again when a
/// command fails with an I/O or dropped-connection error, so the next call
/// reconnects.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    connected: AtomicBool,
    reconnections: AtomicU32,
    config: RedisConfig,
}

impl RedisPool {
    /// Create a new pool. No connection is made until the first command.
    pub fn new(config: RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            connected: AtomicBool::new(false),
            reconnections: AtomicU32::new(0),
            config,
        })
    }

    /// Get the shared connection, connecting if needed.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                if self.connected.swap(true, Ordering::AcqRel) {
                    self.reconnections.fetch_add(1, Ordering::Relaxed);
                }
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::ConnectionUnavailable(e.to_string()))
            }
        }
    }

    /// Run a command on the shared connection, resetting it on I/O failure.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    self.connected.store(false, Ordering::Release);
                }
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Get one hash field.
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, PoolError> {
        let key = key.to_string();
        let field = field.to_string();
        self.execute(|mut conn| async move { conn.hget(key, field).await })
            .await
    }

    /// Get all fields of a hash. A missing key yields an empty list.
    pub async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError> {
        let key = key.to_string();
        self.execute(|mut conn| async move { conn.hgetall(key).await })
            .await
    }

    /// Ping Redis to check connectivity.
    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    /// Whether the last connection attempt succeeded
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of times the connection was re-established
    pub fn reconnections(&self) -> u32 {
        self.reconnections.load(Ordering::Relaxed)
    }

    /// Get the Redis URL (for debugging).
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_does_not_connect() {
        let pool = RedisPool::new(RedisConfig::default()).unwrap();
        assert!(!pool.is_connected());
        assert_eq!(pool.reconnections(), 0);
        assert_eq!(pool.url(), "redis://localhost:6379");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };
        assert!(RedisPool::new(config).is_err());
    }
}
