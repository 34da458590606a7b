//! Core types and service wiring for the taka waste-service portal.

/// Errors surfaced by the service facade.
pub mod error;
/// Bounded device location acquisition.
pub mod location;
/// Domain models and identifiers shared by all zone sources.
pub mod model;
/// Traits describing the zone source, location sensor and notifier interfaces.
pub mod ports;
/// Weekly collection recurrence.
pub mod recurrence;
/// Read-only registry of the loaded zones.
pub mod registry;
/// One-shot collection reminders.
pub mod reminder;
/// Point-in-zone resolution.
pub mod resolver;
/// High-level service facade used by clients.
pub mod service;

pub use error::*;
pub use model::*;
pub use ports::*;
pub use registry::*;
pub use reminder::{ReminderError, ReminderId, ReminderScheduler, ReminderState, ReminderTask};
pub use resolver::{Resolution, ResolveWarning};
pub use service::*;
