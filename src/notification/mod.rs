//! Notification messages and the dispatcher that produces them.
//!
//! - `types`: recipients, delivery options and the push message itself
//! - `catalog`: incident type to display text mapping
//! - `shaping`: builds messages from events and lookup results
//! - `outcome`: terminal results and failure classification
//! - `dispatcher`: [`NotificationDispatcher`], one event in, one outcome out

mod catalog;
mod dispatcher;
mod outcome;
mod shaping;
mod types;

pub use catalog::{IncidentCatalog, IncidentCopy};
pub use dispatcher::{DispatcherStats, DispatcherStatsSnapshot, NotificationDispatcher};
pub use outcome::{DeliveryFailure, DeliveryOutcome, DispatchError, OutcomeKind, SkipReason, Stage};
pub use shaping::{format_coordinate, MessageShaper, CLICK_ACTION};
pub use types::{
    DeliveryOptions, MessageId, NotificationMessage, NotificationMessageBuilder, Priority,
    Recipient,
};
