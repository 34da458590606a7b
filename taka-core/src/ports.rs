//! Traits describing the external collaborators of the core and shared helper types.

use std::fmt;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;

use crate::model::{GeoPoint, ServiceAreaMeta, ZoneRecord};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a zone data source.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] JsonError),
    /// Payload decoded but describes impossible data.
    #[error("Malformed zone data: {0}")]
    Malformed(String),
    /// Internal source error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Read-only collection of zone records for one service area.
pub trait ZoneSource: Send + Sync {
    /// Metadata describing the service area covered by this source.
    fn service_area(&self) -> &ServiceAreaMeta;

    /// Fetch every zone record. Called once per session.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the source cannot be reached or returns unreadable data.
    async fn fetch_zones(&self) -> Result<Vec<ZoneRecord>, PortError>;
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Ways a location fix can fail. All are recoverable by picking a zone manually.
pub enum LocationError {
    /// The user refused access to the location sensor.
    #[error("Location permission denied")]
    PermissionDenied,
    /// The sensor could not determine a position.
    #[error("Position unavailable")]
    PositionUnavailable,
    /// No fix arrived within the allowed time.
    #[error("Timed out waiting for a location fix")]
    Timeout,
}

#[async_trait]
/// Device location sensor yielding a single fix.
pub trait LocationSensor: Send + Sync {
    /// Ask the sensor for the current position. May never complete; callers bound it.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] when no position can be produced.
    async fn current_position(&self) -> Result<GeoPoint, LocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// State of the permission to show local notifications.
pub enum NotificationPermission {
    /// Notifications may be shown.
    Granted,
    /// The user refused notifications.
    Denied,
    /// The user has not been asked yet.
    #[default]
    Prompt,
}

impl fmt::Display for NotificationPermission {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
            NotificationPermission::Prompt => "not asked",
        };
        formatter.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A local notification ready to be shown.
pub struct Notification {
    /// Headline.
    pub title: String,
    /// Body text.
    pub body: String,
}

/// Local notification capability of the device.
pub trait Notifier: Send + Sync + 'static {
    /// Current permission state, read at call time.
    fn permission(&self) -> NotificationPermission;

    /// Ask the user for permission and return the resulting state.
    fn request_permission(&self) -> NotificationPermission;

    /// Show a notification. Fire-and-forget; there is no receipt.
    fn dispatch(&self, notification: Notification);
}
