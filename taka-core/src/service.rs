//! High-level service facade combining zones, selection and reminders.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone};
use tracing::info;

use crate::error::CoreError;
use crate::location::{self, DEFAULT_LOCATION_TIMEOUT};
use crate::model::{GeoPoint, SelectionOrigin, ServiceAreaMeta, Zone, ZoneId, ZoneSelection};
use crate::ports::{LocationSensor, NotificationPermission, Notifier, ZoneSource};
use crate::recurrence;
use crate::registry::{AreaMatch, ZoneRegistry};
use crate::reminder::{ReminderScheduler, ReminderTask, default_lead};
use crate::resolver::{self, ResolveWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tunables of a [`CollectionService`].
pub struct ServiceSettings {
    /// Distance between a reminder and the collection it announces.
    pub reminder_lead: TimeDelta,
    /// Upper bound for waiting on the location sensor.
    pub location_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            reminder_lead: default_lead(),
            location_timeout: DEFAULT_LOCATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Outcome of selecting a zone from a point.
pub struct PointSelection {
    /// The resolved point.
    pub point: GeoPoint,
    /// Zone now selected, or `None` when the point lies outside every zone.
    pub zone: Option<ZoneId>,
    /// Skipped zones and overlaps met during resolution.
    pub warnings: Vec<ResolveWarning>,
}

/// Public entry point for one portal session.
pub struct CollectionService {
    service_area: ServiceAreaMeta,
    registry: ZoneRegistry,
    notifier: Arc<dyn Notifier>,
    reminders: ReminderScheduler,
    selection: Option<ZoneSelection>,
    settings: ServiceSettings,
}

impl CollectionService {
    /// Load the zones of `source` and start a session without a selected zone.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DataUnavailable`] if the zones cannot be loaded.
    #[tracing::instrument(skip_all, err, fields(service_area = %source.service_area().name))]
    pub async fn load(
        source: &dyn ZoneSource,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> Result<Self, CoreError> {
        let registry = ZoneRegistry::load(source).await?;
        Ok(Self::new(source.service_area().clone(), registry, notifier, settings))
    }

    /// Create a session over an already loaded registry.
    #[must_use]
    pub fn new(
        service_area: ServiceAreaMeta,
        registry: ZoneRegistry,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            service_area,
            registry,
            reminders: ReminderScheduler::new(Arc::clone(&notifier)),
            notifier,
            selection: None,
            settings,
        }
    }

    /// Service area the zones belong to.
    #[must_use]
    pub fn service_area(&self) -> &ServiceAreaMeta {
        &self.service_area
    }

    /// Session settings.
    #[must_use]
    pub fn settings(&self) -> ServiceSettings {
        self.settings
    }

    /// All zones in load order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        self.registry.all_zones()
    }

    /// Current selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&ZoneSelection> {
        self.selection.as_ref()
    }

    /// Currently selected zone, if any.
    #[must_use]
    pub fn selected_zone(&self) -> Option<&Zone> {
        current_zone(&self.registry, self.selection.as_ref()).ok()
    }

    /// Served areas matching `query`; see [`ZoneRegistry::search_areas`].
    #[must_use]
    pub fn search_areas(&self, query: &str) -> Vec<AreaMatch<'_>> {
        self.registry.search_areas(query)
    }

    /// Select a zone from the zone list.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownZone`] when no zone has this id; the selection is
    /// unchanged.
    pub fn select_zone(&mut self, id: &ZoneId) -> Result<&Zone, CoreError> {
        let zone = self
            .registry
            .find_by_id(id)
            .ok_or_else(|| CoreError::UnknownZone(id.clone()))?;
        apply_selection(&mut self.reminders, &mut self.selection, zone, SelectionOrigin::Manual);
        Ok(zone)
    }

    /// Select the zone serving the first area matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoAreaMatch`] when nothing matches; the selection is unchanged.
    pub fn select_area(&mut self, query: &str) -> Result<&Zone, CoreError> {
        let hit = self
            .registry
            .search_areas(query)
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NoAreaMatch(query.trim().to_owned()))?;
        apply_selection(
            &mut self.reminders,
            &mut self.selection,
            hit.zone,
            SelectionOrigin::AreaSearch,
        );
        Ok(hit.zone)
    }

    /// Select the zone containing `point`.
    ///
    /// A point outside every zone leaves the current selection in place and reports
    /// `zone: None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Resolve`] for an invalid point.
    pub fn select_point(&mut self, point: GeoPoint) -> Result<PointSelection, CoreError> {
        let resolution = resolver::resolve(point, self.registry.all_zones())?;

        let zone = resolution.zone.map(|zone| {
            apply_selection(
                &mut self.reminders,
                &mut self.selection,
                zone,
                SelectionOrigin::ResolvedPoint(point),
            );
            zone.id.clone()
        });
        if zone.is_none() {
            info!(%point, "point lies outside every zone");
        }

        Ok(PointSelection {
            point,
            zone,
            warnings: resolution.warnings,
        })
    }

    /// Ask `sensor` for a fix within the configured timeout and select the zone there.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Location`] when no fix is available and
    /// [`CoreError::Resolve`] when the sensor reports an invalid point.
    #[tracing::instrument(skip_all, err)]
    pub async fn locate(
        &mut self,
        sensor: &dyn LocationSensor,
    ) -> Result<PointSelection, CoreError> {
        let point = location::acquire(sensor, self.settings.location_timeout).await?;
        self.select_point(point)
    }

    /// Next collection of the selected zone after `now`'s day, at the window opening.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoZoneSelected`] without a selection and
    /// [`CoreError::Recurrence`] when the zone has no collection days.
    pub fn next_collection<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, CoreError> {
        let zone = current_zone(&self.registry, self.selection.as_ref())?;
        Ok(recurrence::collection_instant(zone, now)?)
    }

    /// Arm a reminder ahead of the next collection of the selected zone.
    ///
    /// Replaces any earlier reminder. The returned task is skipped rather than armed
    /// when the lead window has already started.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Reminder`] without notification permission, plus the
    /// errors of [`CollectionService::next_collection`].
    #[tracing::instrument(skip_all, err)]
    pub fn enable_reminder<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
    ) -> Result<ReminderTask, CoreError> {
        let zone = current_zone(&self.registry, self.selection.as_ref())?;
        let occurrence = recurrence::collection_instant(zone, now)?.fixed_offset();
        let permission = self.notifier.permission();

        Ok(self.reminders.arm(
            zone,
            occurrence,
            self.settings.reminder_lead,
            permission,
            now.fixed_offset(),
        )?)
    }

    /// Cancel the pending reminder, if any.
    pub fn cancel_reminder(&mut self) {
        self.reminders.cancel_active();
    }

    /// The latest reminder of the session, whatever its state.
    #[must_use]
    pub fn reminder(&self) -> Option<&ReminderTask> {
        self.reminders.active()
    }

    /// Current notification permission.
    #[must_use]
    pub fn notification_permission(&self) -> NotificationPermission {
        self.notifier.permission()
    }

    /// Ask the user for notification permission.
    pub fn request_notification_permission(&self) -> NotificationPermission {
        let permission = self.notifier.request_permission();
        info!(%permission, "notification permission requested");
        permission
    }

    /// Re-read the notification permission. An armed reminder is cancelled when the
    /// permission is no longer granted.
    pub fn refresh_notification_permission(&mut self) -> NotificationPermission {
        let permission = self.notifier.permission();
        self.reminders.permission_changed(permission);
        permission
    }
}

fn current_zone<'r>(
    registry: &'r ZoneRegistry,
    selection: Option<&ZoneSelection>,
) -> Result<&'r Zone, CoreError> {
    let selection = selection.ok_or(CoreError::NoZoneSelected)?;
    registry
        .find_by_id(&selection.zone)
        .ok_or_else(|| CoreError::UnknownZone(selection.zone.clone()))
}

fn apply_selection(
    reminders: &mut ReminderScheduler,
    selection: &mut Option<ZoneSelection>,
    zone: &Zone,
    origin: SelectionOrigin,
) {
    reminders.zone_changed(&zone.id);
    info!(zone = %zone.id, ?origin, "zone selected");
    *selection = Some(ZoneSelection {
        zone: zone.id.clone(),
        origin,
    });
}
