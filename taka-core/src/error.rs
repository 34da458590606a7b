//! Errors surfaced by the service facade.

use crate::model::ZoneId;
use crate::ports::{LocationError, PortError};
use crate::recurrence::RecurrenceError;
use crate::reminder::ReminderError;
use crate::resolver::ResolveError;

#[derive(thiserror::Error, Debug)]
/// Everything that can go wrong between the UI and the core.
pub enum CoreError {
    /// The zone source could not be reached or returned malformed data.
    #[error("Zone data unavailable: {0}")]
    DataUnavailable(#[source] PortError),
    /// No zone with this identifier was loaded.
    #[error("Unknown zone: {0}")]
    UnknownZone(ZoneId),
    /// No served area matches the search.
    #[error("No zone serves an area matching \"{0}\"")]
    NoAreaMatch(String),
    /// An operation needs a selected zone.
    #[error("No zone selected")]
    NoZoneSelected,
    /// The point to resolve is invalid.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Recurrence could not be computed.
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    /// Reminder could not be armed.
    #[error(transparent)]
    Reminder(#[from] ReminderError),
    /// Location fix failed.
    #[error(transparent)]
    Location(#[from] LocationError),
}
