use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain event delivered by an event source.
///
/// Events are consumed once by the dispatcher and never stored. The `id` is
/// assigned by the source and is stable across redeliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique identifier assigned by the event source
    pub id: String,
    /// When the underlying write happened
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    /// Variant-specific payload
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Payload variants of a domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventKind {
    /// A new incident report was written
    IncidentCreated(IncidentReport),
    /// A device entered or left a geofence
    GeofenceCrossed(GeofenceCrossing),
}

/// Incident report payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    #[serde(rename = "type", default = "IncidentType::unspecified")]
    pub incident_type: IncidentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Geofence crossing payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCrossing {
    pub user_id: String,
    pub geofence_id: String,
    pub crossing_kind: CrossingKind,
}

/// Category of a reported incident.
///
/// Parsing is total: any label that is not one of the known kinds is kept
/// verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IncidentType {
    Fire,
    Theft,
    Crash,
    Other(String),
}

/// Direction of a geofence crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingKind {
    Enter,
    Exit,
}

impl DomainEvent {
    /// Create an incident event stamped with the current time
    pub fn incident(id: impl Into<String>, report: IncidentReport) -> Self {
        Self {
            id: id.into(),
            occurred_at: Utc::now(),
            kind: EventKind::IncidentCreated(report),
        }
    }

    /// Create a geofence crossing event stamped with the current time
    pub fn geofence(id: impl Into<String>, crossing: GeofenceCrossing) -> Self {
        Self {
            id: id.into(),
            occurred_at: Utc::now(),
            kind: EventKind::GeofenceCrossed(crossing),
        }
    }

    /// Short name of the event variant, used as a log field and metric label
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Check that the event carries everything needed to build a message.
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("event id must not be empty".to_string());
        }

        match &self.kind {
            EventKind::IncidentCreated(report) => report.validate(),
            EventKind::GeofenceCrossed(crossing) => crossing.validate(),
        }
    }
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::IncidentCreated(_) => "incident_created",
            EventKind::GeofenceCrossed(_) => "geofence_crossed",
        }
    }
}

impl IncidentReport {
    pub fn new(incident_type: IncidentType, latitude: f64, longitude: f64) -> Self {
        Self {
            incident_type,
            description: None,
            latitude,
            longitude,
        }
    }

    /// Set the free-text description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description with surrounding whitespace removed, `None` when blank
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    fn validate(&self) -> Result<(), String> {
        validate_coordinates(self.latitude, self.longitude)
    }
}

impl GeofenceCrossing {
    pub fn new(
        user_id: impl Into<String>,
        geofence_id: impl Into<String>,
        crossing_kind: CrossingKind,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            geofence_id: geofence_id.into(),
            crossing_kind,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("geofence event userId must not be empty".to_string());
        }
        if self.geofence_id.trim().is_empty() {
            return Err("geofence event geofenceId must not be empty".to_string());
        }
        Ok(())
    }
}

/// Reject coordinates that cannot be rendered into a deep link
pub(crate) fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude out of range: {}", latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude out of range: {}", longitude));
    }
    Ok(())
}

impl IncidentType {
    /// Label used when a report carries no type at all
    pub const UNSPECIFIED_LABEL: &'static str = "alert";

    fn unspecified() -> Self {
        IncidentType::Other(Self::UNSPECIFIED_LABEL.to_string())
    }

    /// Parse a free-form label. Never fails.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "fire" => IncidentType::Fire,
            "theft" => IncidentType::Theft,
            "crash" => IncidentType::Crash,
            "" => Self::unspecified(),
            _ => IncidentType::Other(trimmed.to_string()),
        }
    }

    /// Wire label of this type
    pub fn as_str(&self) -> &str {
        match self {
            IncidentType::Fire => "fire",
            IncidentType::Theft => "theft",
            IncidentType::Crash => "crash",
            IncidentType::Other(label) => label,
        }
    }
}

impl From<String> for IncidentType {
    fn from(value: String) -> Self {
        IncidentType::parse(&value)
    }
}

impl From<&str> for IncidentType {
    fn from(value: &str) -> Self {
        IncidentType::parse(value)
    }
}

impl From<IncidentType> for String {
    fn from(value: IncidentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CrossingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossingKind::Enter => "enter",
            CrossingKind::Exit => "exit",
        }
    }
}

impl fmt::Display for CrossingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incident_type_parsing_is_total() {
        assert_eq!(IncidentType::parse("fire"), IncidentType::Fire);
        assert_eq!(IncidentType::parse("FIRE"), IncidentType::Fire);
        assert_eq!(IncidentType::parse(" theft "), IncidentType::Theft);
        assert_eq!(IncidentType::parse("crash"), IncidentType::Crash);
        assert_eq!(
            IncidentType::parse("flood"),
            IncidentType::Other("flood".to_string())
        );
        assert_eq!(IncidentType::parse("").as_str(), "alert");
    }

    #[test]
    fn test_deserialize_incident_event() {
        let event: DomainEvent = serde_json::from_value(json!({
            "id": "e1",
            "occurredAt": "2024-05-01T12:00:00Z",
            "kind": "incidentCreated",
            "type": "fire",
            "latitude": 1.0,
            "longitude": 2.0
        }))
        .unwrap();

        assert_eq!(event.id, "e1");
        assert_eq!(event.kind_name(), "incident_created");
        match event.kind {
            EventKind::IncidentCreated(report) => {
                assert_eq!(report.incident_type, IncidentType::Fire);
                assert_eq!(report.description, None);
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_missing_incident_type_defaults_to_alert() {
        let event: DomainEvent = serde_json::from_value(json!({
            "id": "e2",
            "kind": "incidentCreated",
            "latitude": 0.0,
            "longitude": 0.0
        }))
        .unwrap();

        match event.kind {
            EventKind::IncidentCreated(report) => {
                assert_eq!(report.incident_type.as_str(), "alert");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_geofence_event() {
        let event: DomainEvent = serde_json::from_value(json!({
            "id": "g-evt",
            "kind": "geofenceCrossed",
            "userId": "u1",
            "geofenceId": "g1",
            "crossingKind": "exit"
        }))
        .unwrap();

        assert_eq!(
            event.kind,
            EventKind::GeofenceCrossed(GeofenceCrossing::new("u1", "g1", CrossingKind::Exit))
        );
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result: Result<DomainEvent, _> = serde_json::from_value(json!({
            "id": "g-evt",
            "kind": "geofenceCrossed",
            "geofenceId": "g1"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_crossing_kind_is_rejected() {
        let result: Result<DomainEvent, _> = serde_json::from_value(json!({
            "id": "e1",
            "kind": "geofenceCrossed",
            "userId": "u1",
            "geofenceId": "g1"
        }));
        assert!(result.is_err());

        let result: Result<DomainEvent, _> = serde_json::from_value(json!({
            "id": "e1",
            "kind": "geofenceCrossed",
            "userId": "u1",
            "geofenceId": "g1",
            "crossingKind": "sideways"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        let ok = DomainEvent::incident("e1", IncidentReport::new(IncidentType::Fire, 1.0, 2.0));
        assert!(ok.validate().is_ok());

        let empty_id = DomainEvent::incident(" ", IncidentReport::new(IncidentType::Fire, 1.0, 2.0));
        assert!(empty_id.validate().is_err());

        let bad_lat = DomainEvent::incident("e1", IncidentReport::new(IncidentType::Fire, 91.0, 0.0));
        assert!(bad_lat.validate().is_err());

        let nan_lng =
            DomainEvent::incident("e1", IncidentReport::new(IncidentType::Fire, 0.0, f64::NAN));
        assert!(nan_lng.validate().is_err());

        let no_user = DomainEvent::geofence("e1", GeofenceCrossing::new("", "g1", CrossingKind::Enter));
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn test_blank_description_is_absent() {
        let report = IncidentReport::new(IncidentType::Theft, 0.0, 0.0).with_description("   ");
        assert_eq!(report.description(), None);

        let report = report.with_description(" Bike stolen ");
        assert_eq!(report.description(), Some("Bike stolen"));
    }
}
