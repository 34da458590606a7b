//! Weekly recurrence: next collection day, collection instant and month calendars.
//!
//! The next occurrence is always strictly after the reference day. A zone collected
//! on Mondays that is asked on a Monday morning answers with the following Monday,
//! even if the collection window has not opened yet.

use chrono::{
    DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Weekday,
};

use crate::model::{WeekdaySet, Zone};

/// How far to look past a local time that falls into a DST gap, in quarter hours.
const GAP_SEARCH_STEPS: i64 = 8;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures of the recurrence calculation.
pub enum RecurrenceError {
    /// The zone has no collection day configured. This is a caller defect.
    #[error("Zone has no collection days")]
    EmptyRecurrence,
    /// The computed local time does not exist in the time zone or overflows the calendar.
    #[error("Cannot represent local time {0}")]
    Unrepresentable(NaiveDateTime),
}

/// Start of the next day after `from`'s own day whose weekday is in `weekdays`.
///
/// # Errors
///
/// Returns [`RecurrenceError::EmptyRecurrence`] for an empty set.
pub fn next_occurrence<Tz: TimeZone>(
    weekdays: WeekdaySet,
    from: &DateTime<Tz>,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let day = next_collection_date(weekdays, from.date_naive())?;
    local_instant(&from.timezone(), day.and_time(NaiveTime::MIN))
}

/// Next collection of `zone` after `from`'s day, at the opening of its time window.
///
/// Zones whose window has no readable opening bound are placed at midnight.
///
/// # Errors
///
/// Returns [`RecurrenceError::EmptyRecurrence`] when the zone has no collection days.
pub fn collection_instant<Tz: TimeZone>(
    zone: &Zone,
    from: &DateTime<Tz>,
) -> Result<DateTime<Tz>, RecurrenceError> {
    let day = next_collection_date(zone.collection_days, from.date_naive())?;
    let opens_at = zone.time_window.opens_at().unwrap_or(NaiveTime::MIN);
    local_instant(&from.timezone(), day.and_time(opens_at))
}

/// Calendar day of the next collection strictly after `after`.
///
/// # Errors
///
/// Returns [`RecurrenceError::EmptyRecurrence`] for an empty set.
pub fn next_collection_date(
    weekdays: WeekdaySet,
    after: NaiveDate,
) -> Result<NaiveDate, RecurrenceError> {
    let today = after.weekday();
    let offset = weekdays
        .iter()
        .map(|day| days_ahead(today, day))
        .min()
        .ok_or(RecurrenceError::EmptyRecurrence)?;

    after
        .checked_add_days(Days::new(offset.into()))
        .ok_or_else(|| RecurrenceError::Unrepresentable(after.and_time(NaiveTime::MIN)))
}

/// Every date of the given month that falls on one of `weekdays`.
///
/// An invalid month yields an empty list.
#[must_use]
pub fn collection_dates_in_month(weekdays: WeekdaySet, year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|day| day.month() == month)
        .filter(|day| weekdays.contains(day.weekday()))
        .collect()
}

/// Days from `today` forward to `target`; the same weekday counts as a full week.
fn days_ahead(today: Weekday, target: Weekday) -> u32 {
    match (target.num_days_from_monday() + 7 - today.num_days_from_monday()) % 7 {
        0 => 7,
        days => days,
    }
}

fn local_instant<Tz: TimeZone>(
    tz: &Tz,
    local: NaiveDateTime,
) -> Result<DateTime<Tz>, RecurrenceError> {
    if let Some(instant) = tz.from_local_datetime(&local).earliest() {
        return Ok(instant);
    }

    // The wall-clock time was skipped by a DST jump; take the first valid quarter hour.
    (1..=GAP_SEARCH_STEPS)
        .filter_map(|step| local.checked_add_signed(TimeDelta::minutes(15 * step)))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .ok_or(RecurrenceError::Unrepresentable(local))
}
