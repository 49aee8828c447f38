//! Redis-backed directory lookups.
//!
//! Users are stored as hashes at `{user_prefix}:{user_id}` with the device
//! token in the `deviceToken` field. Geofences are hashes at
//! `{geofence_prefix}:{geofence_id}` with `type`, `description`, `latitude`
//! and `longitude` fields.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::event::{validate_coordinates, IncidentType};
use crate::redis::RedisPool;

use super::{GeofenceRecord, GeofenceStore, LookupError, UserDirectory};

/// Hash field holding a user's device token
const DEVICE_TOKEN_FIELD: &str = "deviceToken";

/// User directory reading device tokens from Redis hashes
pub struct RedisUserDirectory {
    pool: Arc<RedisPool>,
    key_prefix: String,
}

impl RedisUserDirectory {
    pub fn new(pool: Arc<RedisPool>, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
        }
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl UserDirectory for RedisUserDirectory {
    async fn lookup_token(&self, user_id: &str) -> Result<Option<String>, LookupError> {
        let token = self.pool.hget(&self.user_key(user_id), DEVICE_TOKEN_FIELD).await?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }
}

/// Geofence store reading metadata from Redis hashes
pub struct RedisGeofenceStore {
    pool: Arc<RedisPool>,
    key_prefix: String,
}

impl RedisGeofenceStore {
    pub fn new(pool: Arc<RedisPool>, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
        }
    }

    fn geofence_key(&self, geofence_id: &str) -> String {
        format!("{}:{}", self.key_prefix, geofence_id)
    }
}

#[async_trait]
impl GeofenceStore for RedisGeofenceStore {
    async fn lookup_geofence(&self, geofence_id: &str) -> Result<Option<GeofenceRecord>, LookupError> {
        let fields = self.pool.hgetall(&self.geofence_key(geofence_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        parse_geofence(fields.into_iter().collect()).map(Some)
    }
}

/// Build a record from raw hash fields
fn parse_geofence(fields: HashMap<String, String>) -> Result<GeofenceRecord, LookupError> {
    let incident_type = fields
        .get("type")
        .map(|t| IncidentType::parse(t))
        .unwrap_or_else(|| IncidentType::parse(""));

    let latitude = parse_coordinate(&fields, "latitude")?;
    let longitude = parse_coordinate(&fields, "longitude")?;
    validate_coordinates(latitude, longitude).map_err(LookupError::Malformed)?;

    let description = fields
        .get("description")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(GeofenceRecord {
        incident_type,
        description,
        latitude,
        longitude,
    })
}

fn parse_coordinate(fields: &HashMap<String, String>, name: &str) -> Result<f64, LookupError> {
    let raw = fields
        .get(name)
        .ok_or_else(|| LookupError::Malformed(format!("missing field {}", name)))?;

    raw.trim()
        .parse::<f64>()
        .map_err(|e| LookupError::Malformed(format!("invalid {} '{}': {}", name, raw, e)))
}
