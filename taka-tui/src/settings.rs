//! Layered configuration: `taka.toml`, `taka.local.toml`, then `TAKA__*` variables.

use std::time::Duration;

use chrono::TimeDelta;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;
use taka_core::{GeoPoint, NotificationPermission, ParsePointError, ServiceSettings};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SourceKind {
    Builtin,
    Http,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ZoneSettings {
    pub(crate) source: SourceKind,
    pub(crate) url: Option<String>,
    pub(crate) service_area: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ReminderSettings {
    pub(crate) lead_hours: i64,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LocationSettings {
    pub(crate) timeout_secs: u64,
    /// Fixed `lat, lon` reported as the device position.
    pub(crate) device: Option<String>,
}

impl LocationSettings {
    pub(crate) fn device_point(&self) -> Result<Option<GeoPoint>, ParsePointError> {
        self.device.as_deref().map(str::parse).transpose()
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct NotificationSettings {
    pub(crate) permission: NotificationPermission,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LogSettings {
    pub(crate) file: String,
    pub(crate) filter: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AppSettings {
    pub(crate) zones: ZoneSettings,
    pub(crate) reminder: ReminderSettings,
    pub(crate) location: LocationSettings,
    pub(crate) notifications: NotificationSettings,
    pub(crate) log: LogSettings,
}

impl AppSettings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let builder = defaults()?
            .add_source(File::with_name("taka").required(false))
            .add_source(File::with_name("taka.local").required(false))
            .add_source(Environment::with_prefix("TAKA").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub(crate) fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            reminder_lead: TimeDelta::hours(self.reminder.lead_hours.max(0)),
            location_timeout: Duration::from_secs(self.location.timeout_secs),
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("zones.source", "builtin")?
        .set_default("zones.service_area", "Nyeri")?
        .set_default("reminder.lead_hours", 24)?
        .set_default("location.timeout_secs", 10)?
        .set_default("notifications.permission", "prompt")?
        .set_default("log.file", "taka.log")?
        .set_default("log.filter", "info")
}
