//! Terminal stand-ins for the device notification and location capabilities.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use taka_core::{
    GeoPoint, LocationError, LocationSensor, Notification, NotificationPermission, Notifier,
};
use tracing::info;

/// Collects dispatched reminders in an inbox the UI drains on every tick.
pub(crate) struct TerminalNotifier {
    permission: Mutex<NotificationPermission>,
    inbox: Mutex<Vec<Notification>>,
}

impl TerminalNotifier {
    pub(crate) fn new(permission: NotificationPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            inbox: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn take_inbox(&self) -> Vec<Notification> {
        std::mem::take(&mut *lock(&self.inbox))
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> NotificationPermission {
        *lock(&self.permission)
    }

    // Pressing the permission key is the user's answer to the prompt. A refusal
    // stored in the configuration is kept.
    fn request_permission(&self) -> NotificationPermission {
        let mut permission = lock(&self.permission);
        if *permission == NotificationPermission::Prompt {
            *permission = NotificationPermission::Granted;
        }
        *permission
    }

    fn dispatch(&self, notification: Notification) {
        info!(title = %notification.title, "notification delivered to terminal inbox");
        lock(&self.inbox).push(notification);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reports the position configured under `location.device`, if any.
pub(crate) struct ConfiguredSensor {
    position: Option<GeoPoint>,
}

impl ConfiguredSensor {
    pub(crate) fn new(position: Option<GeoPoint>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl LocationSensor for ConfiguredSensor {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        self.position.ok_or(LocationError::PositionUnavailable)
    }
}
