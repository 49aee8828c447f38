//! Domain events consumed by the dispatcher.

mod types;

pub use types::{CrossingKind, DomainEvent, EventKind, GeofenceCrossing, IncidentReport, IncidentType};
pub(crate) use types::validate_coordinates;
