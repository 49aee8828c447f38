//! In-memory directory backends using DashMap.
//!
//! Contents live only as long as the process and are intended for local
//! development and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{GeofenceRecord, GeofenceStore, LookupError, UserDirectory};

/// In-memory user id to device token map
#[derive(Default)]
pub struct MemoryUserDirectory {
    tokens: DashMap<String, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user's device token
    pub fn register(&self, user_id: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(user_id.into(), token.into());
    }

    /// Remove a user's token, returning it if present
    pub fn unregister(&self, user_id: &str) -> Option<String> {
        self.tokens.remove(user_id).map(|(_, token)| token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn lookup_token(&self, user_id: &str) -> Result<Option<String>, LookupError> {
        Ok(self
            .tokens
            .get(user_id)
            .map(|entry| entry.value().clone())
            .filter(|token| !token.trim().is_empty()))
    }
}

/// In-memory geofence id to metadata map
#[derive(Default)]
pub struct MemoryGeofenceStore {
    geofences: DashMap<String, GeofenceRecord>,
}

impl MemoryGeofenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, geofence_id: impl Into<String>, record: GeofenceRecord) {
        self.geofences.insert(geofence_id.into(), record);
    }

    pub fn remove(&self, geofence_id: &str) -> Option<GeofenceRecord> {
        self.geofences.remove(geofence_id).map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.geofences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geofences.is_empty()
    }
}

#[async_trait]
impl GeofenceStore for MemoryGeofenceStore {
    async fn lookup_geofence(&self, geofence_id: &str) -> Result<Option<GeofenceRecord>, LookupError> {
        Ok(self.geofences.get(geofence_id).map(|entry| entry.value().clone()))
    }
}
