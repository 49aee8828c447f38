//! Turns resolved events into push messages.
//!
//! Incident broadcasts carry pre-rendered text so topic subscribers get a
//! readable alert without correlating back to a store. Geofence messages
//! carry structured data and leave display text to the client unless the
//! rendered policy is configured.

use crate::config::{DispatcherConfig, GeofencePayloadPolicy};
use crate::directory::GeofenceRecord;
use crate::event::{CrossingKind, GeofenceCrossing, IncidentReport};

use super::{DeliveryOptions, IncidentCatalog, NotificationMessage, Priority, Recipient};

/// Tap action routed by the Flutter messaging plugin
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Builds notification messages from events and lookup results
#[derive(Debug, Clone)]
pub struct MessageShaper {
    catalog: IncidentCatalog,
    topic_name: String,
    channel_id: String,
    geofence_policy: GeofencePayloadPolicy,
}

impl MessageShaper {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            catalog: IncidentCatalog::from_config(config),
            topic_name: config.topic_name.clone(),
            channel_id: config.channel_id.clone(),
            geofence_policy: config.geofence_payload,
        }
    }

    /// Replace the incident catalog
    pub fn with_catalog(mut self, catalog: IncidentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &IncidentCatalog {
        &self.catalog
    }

    /// Recipient of every incident broadcast
    pub fn incident_recipient(&self) -> Recipient {
        Recipient::topic(self.topic_name.clone())
    }

    /// Broadcast message for a new incident
    pub fn shape_incident(&self, event_id: &str, report: &IncidentReport) -> NotificationMessage {
        let copy = self.catalog.lookup(&report.incident_type);
        let body = report.description().unwrap_or(copy.body.as_str());

        NotificationMessage::builder(event_id, self.incident_recipient())
            .title(copy.title.clone())
            .body(body)
            .data("click_action", CLICK_ACTION)
            .data("incidentId", event_id)
            .data("type", report.incident_type.as_str())
            .data("lat", format_coordinate(report.latitude))
            .data("lng", format_coordinate(report.longitude))
            .options(DeliveryOptions::new(Priority::High, self.channel_id.clone(), true))
            .build()
    }

    /// Direct message for a geofence crossing
    pub fn shape_geofence(
        &self,
        event_id: &str,
        crossing: &GeofenceCrossing,
        geofence: &GeofenceRecord,
        recipient: Recipient,
    ) -> NotificationMessage {
        let builder = NotificationMessage::builder(event_id, recipient)
            .data("click_action", CLICK_ACTION)
            .data("geofenceId", crossing.geofence_id.as_str())
            .data("type", geofence.incident_type.as_str())
            .data("description", geofence.description.as_deref().unwrap_or_default())
            .data("crossingKind", crossing.crossing_kind.as_str())
            .data("lat", format_coordinate(geofence.latitude))
            .data("lng", format_coordinate(geofence.longitude));

        match self.geofence_policy {
            GeofencePayloadPolicy::Structured => builder
                .options(DeliveryOptions::new(Priority::High, self.channel_id.clone(), false))
                .build(),
            GeofencePayloadPolicy::Rendered => {
                let (title, body) = rendered_geofence_text(crossing.crossing_kind);
                builder
                    .title(title)
                    .body(body)
                    .options(DeliveryOptions::new(Priority::High, self.channel_id.clone(), true))
                    .build()
            }
        }
    }
}

impl Default for MessageShaper {
    fn default() -> Self {
        Self::new(&DispatcherConfig::default())
    }
}

fn rendered_geofence_text(kind: CrossingKind) -> (&'static str, &'static str) {
    match kind {
        CrossingKind::Enter => ("You entered a high-risk zone", "Please be careful in this area."),
        CrossingKind::Exit => ("You left a high-risk zone", "Stay alert for nearby incidents."),
    }
}

/// Shortest decimal rendering: `1.0` becomes `"1"`, `2.5` stays `"2.5"`,
/// and `-0.0` is written as `"0"`
pub fn format_coordinate(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    value.to_string()
}
