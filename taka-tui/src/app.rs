use std::sync::Arc;

use chrono::{Datelike, Local, Months, NaiveDate};
use taka_core::{
    CollectionService, CoreError, GeoPoint, LocationSensor, PointSelection, ReminderState,
    registry::AreaMatch,
};
use tracing::warn;

use crate::devices::TerminalNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    ZoneSelect,
    AreaSearch,
    PointEntry,
    ScheduleView,
}

pub(crate) struct App {
    pub(crate) service: CollectionService,
    pub(crate) notifier: Arc<TerminalNotifier>,
    pub(crate) sensor: Box<dyn LocationSensor>,

    pub(crate) screen: Screen,
    pub(crate) zone_list_index: usize,

    pub(crate) search_input: String,
    pub(crate) search_index: usize,

    pub(crate) point_input: String,

    /// First day of the month shown in the calendar.
    pub(crate) calendar_month: NaiveDate,

    pub(crate) is_loading: bool,
    pub(crate) error_message: Option<String>,
    pub(crate) info_message: Option<String>,
}

impl App {
    pub(crate) fn new(
        service: CollectionService,
        notifier: Arc<TerminalNotifier>,
        sensor: Box<dyn LocationSensor>,
    ) -> Self {
        Self {
            service,
            notifier,
            sensor,
            screen: Screen::ZoneSelect,
            zone_list_index: 0,
            search_input: String::new(),
            search_index: 0,
            point_input: String::new(),
            calendar_month: first_of_month(Local::now().date_naive()),
            is_loading: false,
            error_message: None,
            info_message: None,
        }
    }

    pub(crate) fn area_matches(&self) -> Vec<AreaMatch<'_>> {
        self.service.search_areas(&self.search_input)
    }

    pub(crate) fn select_current_zone(&mut self) {
        let Some(id) = self
            .service
            .zones()
            .get(self.zone_list_index)
            .map(|zone| zone.id.clone())
        else {
            return;
        };
        self.apply(|service| service.select_zone(&id).map(|_zone| ()));
    }

    /// Select the zone of the highlighted search hit.
    pub(crate) fn select_current_area(&mut self) {
        if self.search_input.trim().is_empty() {
            self.error_message = Some("Type part of an area name first".into());
            return;
        }

        let highlighted = self
            .area_matches()
            .get(self.search_index)
            .map(|hit| hit.zone.id.clone());

        match highlighted {
            Some(id) => self.apply(|service| service.select_zone(&id).map(|_zone| ())),
            None => {
                let query = self.search_input.clone();
                self.apply(|service| service.select_area(&query).map(|_zone| ()));
            }
        }
    }

    pub(crate) fn submit_point(&mut self) {
        let point = match self.point_input.parse::<GeoPoint>() {
            Ok(point) => point,
            Err(err) => {
                self.error_message = Some(format!("Cannot read coordinates: {err}"));
                return;
            }
        };
        self.select_point(point);
    }

    pub(crate) fn select_point(&mut self, point: GeoPoint) {
        match self.service.select_point(point) {
            Ok(selection) => self.show_point_selection(&selection),
            Err(err) => self.error_message = Some(err.to_string()),
        }
    }

    pub(crate) async fn locate(&mut self) {
        match self.service.locate(self.sensor.as_ref()).await {
            Ok(selection) => self.show_point_selection(&selection),
            Err(err) => {
                self.error_message = Some(format!("{err}. Pick your zone from the list instead."));
            }
        }
    }

    pub(crate) fn enable_reminder(&mut self) {
        match self.service.enable_reminder(&Local::now()) {
            Ok(task) => {
                self.error_message = None;
                self.info_message = Some(match task.state() {
                    ReminderState::Skipped => format!(
                        "Collection on {} is less than {} hours away, no reminder set",
                        task.occurrence().format("%A %-d %B"),
                        task.lead().num_hours()
                    ),
                    _ => format!("Reminder set for {}", task.due_at().format("%A %-d %B %H:%M")),
                });
            }
            Err(CoreError::Reminder(err)) => {
                self.error_message = Some(format!("{err}. Press n to allow notifications."));
            }
            Err(err) => self.error_message = Some(err.to_string()),
        }
    }

    pub(crate) fn cancel_reminder(&mut self) {
        self.service.cancel_reminder();
        self.info_message = Some("Reminder cancelled".into());
    }

    pub(crate) fn request_permission(&mut self) {
        let permission = self.service.request_notification_permission();
        self.info_message = Some(format!("Notifications {permission}"));
    }

    /// Move delivered reminders into the status line and drop reminders whose
    /// notification permission was withdrawn.
    pub(crate) fn collect_notifications(&mut self) {
        self.service.refresh_notification_permission();
        if let Some(notification) = self.notifier.take_inbox().pop() {
            self.info_message = Some(format!("{}: {}", notification.title, notification.body));
        }
    }

    pub(crate) fn shift_calendar(&mut self, forward: bool) {
        let months = Months::new(1);
        let shifted = if forward {
            self.calendar_month.checked_add_months(months)
        } else {
            self.calendar_month.checked_sub_months(months)
        };
        if let Some(month) = shifted {
            self.calendar_month = month;
        }
    }

    fn apply(&mut self, select: impl FnOnce(&mut CollectionService) -> Result<(), CoreError>) {
        match select(&mut self.service) {
            Ok(()) => {
                self.error_message = None;
                self.info_message = None;
                self.sync_list_index();
                self.screen = Screen::ScheduleView;
            }
            Err(err) => self.error_message = Some(err.to_string()),
        }
    }

    fn show_point_selection(&mut self, selection: &PointSelection) {
        let Some(id) = &selection.zone else {
            warn!(point = %selection.point, "location outside every zone");
            self.error_message = Some(format!(
                "{} is outside every collection zone",
                selection.point
            ));
            return;
        };
        let name = self
            .service
            .zones()
            .iter()
            .find(|candidate| &candidate.id == id)
            .map_or_else(|| id.to_string(), |candidate| candidate.name.clone());
        self.error_message = None;
        self.info_message = Some(format!("{} lies in {name}", selection.point));
        self.sync_list_index();
        self.screen = Screen::ScheduleView;
    }

    fn sync_list_index(&mut self) {
        let selected = self.service.selection().map(|current| &current.zone);
        if let Some(position) = self
            .service
            .zones()
            .iter()
            .position(|zone| Some(&zone.id) == selected)
        {
            self.zone_list_index = position;
        }
    }
}

pub(crate) fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
