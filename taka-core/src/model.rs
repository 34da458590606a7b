//! Domain data structures for zones, points, weekly recurrences and selections.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a service area (a municipality running the portal).
pub struct ServiceAreaId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing the service area a zone source covers.
pub struct ServiceAreaMeta {
    /// Unique identifier.
    pub id: ServiceAreaId,
    /// Display name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Stable identifier of a collection zone.
pub struct ZoneId(pub String);

impl fmt::Display for ZoneId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(id: &str) -> Self {
        ZoneId(id.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A geographic coordinate in decimal degrees.
pub struct GeoPoint {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
}

impl GeoPoint {
    /// Construct a point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Finite and within the latitude/longitude ranges of the globe.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a typed-in coordinate pair was rejected.
pub enum ParsePointError {
    /// Input did not contain exactly two comma or space separated numbers.
    #[error("Expected \"lat, lon\"")]
    Shape,
    /// One of the components is not a number.
    #[error("Not a number: {0}")]
    Number(String),
    /// Numbers parsed but lie outside the globe.
    #[error("Coordinates out of range")]
    OutOfRange,
}

impl FromStr for GeoPoint {
    type Err = ParsePointError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|segment| !segment.is_empty())
            .collect();

        let &[lat, lon] = parts.as_slice() else {
            return Err(ParsePointError::Shape);
        };

        let parse = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_err| ParsePointError::Number(raw.to_owned()))
        };

        let point = GeoPoint::new(parse(lat)?, parse(lon)?);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(ParsePointError::OutOfRange)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Axis-aligned envelope of a zone boundary. Used to centre a map, never for containment.
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Midpoint of the box.
    #[must_use]
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            f64::midpoint(self.south, self.north),
            f64::midpoint(self.west, self.east),
        )
    }
}

/// The seven weekdays in canonical order, Monday first.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// English display name of a weekday.
#[must_use]
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Set of weekdays on which a zone is collected.
///
/// Iteration is always in canonical order (Monday..Sunday) no matter in which
/// order days were inserted.
pub struct WeekdaySet(u8);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown weekday: {0}")]
/// A weekday name could not be recognised.
pub struct UnknownWeekday(pub String);

impl WeekdaySet {
    /// Set without any day.
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    /// Parse English weekday names ("Monday", "thu", ...).
    ///
    /// # Errors
    ///
    /// Returns [`UnknownWeekday`] with the first name that is not a weekday.
    pub fn parse_names<I, S>(names: I) -> Result<Self, UnknownWeekday>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref().trim();
                name.parse::<Weekday>()
                    .map_err(|_err| UnknownWeekday(name.to_owned()))
            })
            .collect()
    }

    /// Add a day to the set.
    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    /// Whether the day is part of the set.
    #[must_use]
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    /// Whether no day is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of days in the set.
    #[must_use]
    pub fn len(self) -> usize {
        self.iter().count()
    }

    /// Days in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for WeekdaySet {
    /// "Monday", "Monday and Thursday", "Monday, Wednesday and Friday".
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(weekday_name).collect();
        match names.split_last() {
            None => formatter.write_str("no collection days"),
            Some((last, [])) => formatter.write_str(last),
            Some((last, rest)) => write!(formatter, "{} and {last}", rest.join(", ")),
        }
    }
}

const OPENING_FORMATS: [&str; 3] = ["%I:%M %p", "%I:%M%p", "%H:%M"];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Display string of a collection window plus its machine-read opening bound.
pub struct TimeWindow {
    label: String,
    opens_at: Option<NaiveTime>,
}

impl TimeWindow {
    /// Wrap a display string such as `"6:00 AM - 10:00 AM"`.
    #[must_use]
    pub fn new<S: Into<String>>(label: S) -> Self {
        let label = label.into();
        let opens_at = parse_opening(&label);
        Self { label, opens_at }
    }

    /// The window exactly as the zone source provided it.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start of the window, when the label could be understood.
    #[must_use]
    pub fn opens_at(&self) -> Option<NaiveTime> {
        self.opens_at
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.label)
    }
}

fn parse_opening(label: &str) -> Option<NaiveTime> {
    let opening = label.split(['-', '–']).next()?.trim();
    if opening.is_empty() {
        return None;
    }
    OPENING_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(opening, format).ok())
}

#[derive(Debug, Clone)]
/// A named polygonal service area with a weekly collection recurrence.
pub struct Zone {
    /// Stable identifier.
    pub id: ZoneId,
    /// Display name, e.g. "Zone A".
    pub name: String,
    /// Boundary ring in insertion order; the last vertex connects back to the first.
    pub boundary: Vec<GeoPoint>,
    /// Neighbourhoods served by the zone (display only).
    pub areas: Vec<String>,
    /// Days on which the zone is collected.
    pub collection_days: WeekdaySet,
    /// Collection window, e.g. "6:00 AM - 10:00 AM".
    pub time_window: TimeWindow,
}

impl Zone {
    /// Envelope of the finite boundary vertices, `None` for an empty boundary.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut vertices = self.boundary.iter().filter(|vertex| vertex.is_finite());
        let first = vertices.next()?;
        let init = BoundingBox {
            west: first.lon,
            south: first.lat,
            east: first.lon,
            north: first.lat,
        };
        Some(vertices.fold(init, |bbox, vertex| BoundingBox {
            west: bbox.west.min(vertex.lon),
            south: bbox.south.min(vertex.lat),
            east: bbox.east.max(vertex.lon),
            north: bbox.north.max(vertex.lat),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
/// Zone identifier as found on the wire: sources use either strings or integers.
pub enum RecordId {
    /// Textual identifier.
    Text(String),
    /// Numeric identifier.
    Number(i64),
}

impl From<RecordId> for ZoneId {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Text(text) => ZoneId(text),
            RecordId::Number(number) => ZoneId(number.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Zone as delivered by a zone data source.
pub struct ZoneRecord {
    /// Identifier, string or integer.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Boundary as `[lat, lon]` pairs.
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    /// Served neighbourhoods.
    #[serde(default)]
    pub areas: Vec<String>,
    /// English weekday names.
    #[serde(default)]
    pub collection_days: Vec<String>,
    /// Display time window.
    #[serde(default)]
    pub time: String,
}

impl TryFrom<ZoneRecord> for Zone {
    type Error = UnknownWeekday;

    fn try_from(record: ZoneRecord) -> Result<Self, Self::Error> {
        let collection_days = WeekdaySet::parse_names(&record.collection_days)?;
        Ok(Zone {
            id: record.id.into(),
            name: record.name,
            boundary: record
                .coordinates
                .into_iter()
                .map(|[lat, lon]| GeoPoint::new(lat, lon))
                .collect(),
            areas: record.areas,
            collection_days,
            time_window: TimeWindow::new(record.time),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// How the current zone was chosen. Only used for messaging.
pub enum SelectionOrigin {
    /// Picked from the zone list.
    Manual,
    /// Picked through a served-area search.
    AreaSearch,
    /// Resolved from a point (device fix or typed coordinates).
    ResolvedPoint(GeoPoint),
}

#[derive(Debug, Clone, PartialEq)]
/// The zone the user is currently looking at.
pub struct ZoneSelection {
    /// Selected zone.
    pub zone: ZoneId,
    /// How it was selected.
    pub origin: SelectionOrigin,
}

impl ZoneSelection {
    /// Whether the selection came from a resolved location rather than a manual pick.
    #[must_use]
    pub fn from_location(&self) -> bool {
        matches!(self.origin, SelectionOrigin::ResolvedPoint(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Weekday};
    use rstest::rstest;

    use super::{GeoPoint, ParsePointError, TimeWindow, WeekdaySet};

    #[test]
    fn weekday_set_iterates_in_canonical_order() {
        let days = WeekdaySet::parse_names(["Thursday", "monday", "Sun"]).expect("valid names");
        let ordered: Vec<Weekday> = days.iter().collect();
        assert_eq!(ordered, vec![Weekday::Mon, Weekday::Thu, Weekday::Sun]);
        assert_eq!(days.to_string(), "Monday, Thursday and Sunday");
    }

    #[test]
    fn weekday_set_rejects_unknown_names() {
        let err = WeekdaySet::parse_names(["Monday", "Funday"]).expect_err("Funday is not a day");
        assert_eq!(err.0, "Funday");
    }

    #[test]
    fn duplicate_days_collapse() {
        let days = WeekdaySet::parse_names(["Monday", "Monday", "Thursday"]).expect("valid names");
        assert_eq!(days.len(), 2);
        assert_eq!(days.to_string(), "Monday and Thursday");
    }

    #[rstest]
    #[case("6:00 AM - 10:00 AM", Some((6, 0)))]
    #[case("6:30 am – 9:30 am", Some((6, 30)))]
    #[case("07:15 - 11:00", Some((7, 15)))]
    #[case("8:00AM - noon", Some((8, 0)))]
    #[case("mornings", None)]
    #[case("", None)]
    fn time_window_reads_opening_bound(#[case] label: &str, #[case] expected: Option<(u32, u32)>) {
        let window = TimeWindow::new(label);
        let expected = expected.and_then(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0));
        assert_eq!(window.opens_at(), expected);
        assert_eq!(window.label(), label);
    }

    #[rstest]
    #[case("-0.4246, 36.9452", Ok(GeoPoint::new(-0.4246, 36.9452)))]
    #[case("-0.4246 36.9452", Ok(GeoPoint::new(-0.4246, 36.9452)))]
    #[case("-0.4246", Err(ParsePointError::Shape))]
    #[case("north, 36.9", Err(ParsePointError::Number("north".to_owned())))]
    #[case("95.0, 36.9", Err(ParsePointError::OutOfRange))]
    fn parses_typed_coordinates(
        #[case] input: &str,
        #[case] expected: Result<GeoPoint, ParsePointError>,
    ) {
        assert_eq!(input.parse::<GeoPoint>(), expected);
    }
}
