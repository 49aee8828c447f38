//! Recipient lookups used by the dispatcher.
//!
//! Two collaborators resolve the target of a geofence notification:
//!
//! - [`UserDirectory`] maps a user id to the device token registered by
//!   that user, if any
//! - [`GeofenceStore`] maps a geofence id to the incident metadata it guards
//!
//! Both distinguish absence (`Ok(None)`) from failure (`Err(LookupError)`).
//! Use [`create_directory`] to build the configured backend pair.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Settings;
use crate::event::IncidentType;
use crate::redis::{PoolError, RedisPool};

pub use memory::{MemoryGeofenceStore, MemoryUserDirectory};
pub use redis_store::{RedisGeofenceStore, RedisUserDirectory};

/// Errors from a directory or store lookup
#[derive(Debug, Error)]
pub enum LookupError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Backend could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Record exists but cannot be interpreted
    #[error("Malformed record: {0}")]
    Malformed(String),
}

impl From<PoolError> for LookupError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => LookupError::Redis(e),
            PoolError::ConnectionUnavailable(msg) => LookupError::Unavailable(msg),
        }
    }
}

/// Incident metadata attached to a geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceRecord {
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeofenceRecord {
    pub fn new(incident_type: IncidentType, latitude: f64, longitude: f64) -> Self {
        Self {
            incident_type,
            description: None,
            latitude,
            longitude,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Resolves the device token registered for a user
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Name used in logs and metric labels
    fn name(&self) -> &'static str {
        "user-directory"
    }

    /// Look up a user's device token.
    ///
    /// Returns `Ok(None)` when the user does not exist or has no token.
    async fn lookup_token(&self, user_id: &str) -> Result<Option<String>, LookupError>;
}

/// Resolves geofence metadata
#[async_trait]
pub trait GeofenceStore: Send + Sync {
    /// Name used in logs and metric labels
    fn name(&self) -> &'static str {
        "geofence-store"
    }

    /// Look up a geofence. Returns `Ok(None)` when it does not exist.
    async fn lookup_geofence(&self, geofence_id: &str) -> Result<Option<GeofenceRecord>, LookupError>;
}

/// Pair of lookup collaborators selected by configuration
pub struct Directory {
    pub users: Arc<dyn UserDirectory>,
    pub geofences: Arc<dyn GeofenceStore>,
}

/// Create the user directory and geofence store based on configuration.
///
/// - `"redis"`: Redis hash backed lookups (requires a pool)
/// - `"memory"` (default): empty in-memory maps
pub fn create_directory(settings: &Settings, redis_pool: Option<Arc<RedisPool>>) -> Directory {
    match (settings.directory.backend.as_str(), redis_pool) {
        ("redis", Some(pool)) => {
            tracing::info!("Using Redis user directory and geofence store");
            Directory {
                users: Arc::new(RedisUserDirectory::new(
                    pool.clone(),
                    settings.redis.user_key_prefix.clone(),
                )),
                geofences: Arc::new(RedisGeofenceStore::new(
                    pool,
                    settings.redis.geofence_key_prefix.clone(),
                )),
            }
        }
        ("redis", None) => {
            tracing::warn!("Redis directory requested but no Redis pool available, using memory");
            memory_directory()
        }
        (backend, _) => {
            if backend != "memory" {
                tracing::warn!(backend = %backend, "Unknown directory backend, using memory");
            } else {
                tracing::info!("Using in-memory user directory and geofence store");
            }
            memory_directory()
        }
    }
}

fn memory_directory() -> Directory {
    Directory {
        users: Arc::new(MemoryUserDirectory::new()),
        geofences: Arc::new(MemoryGeofenceStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_directory() {
        let settings = Settings::default();
        let directory = create_directory(&settings, None);

        assert_eq!(directory.users.lookup_token("nobody").await.unwrap(), None);
        assert_eq!(directory.geofences.lookup_geofence("nowhere").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_without_pool_falls_back_to_memory() {
        let mut settings = Settings::default();
        settings.directory.backend = "redis".to_string();
        let directory = create_directory(&settings, None);

        assert_eq!(directory.users.name(), "user-directory");
        assert_eq!(directory.users.lookup_token("u1").await.unwrap(), None);
    }

    #[test]
    fn test_pool_error_conversion() {
        let err: LookupError = PoolError::ConnectionUnavailable("refused".to_string()).into();
        assert!(matches!(err, LookupError::Unavailable(_)));
    }
}
