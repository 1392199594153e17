//! Typed GDACS feed entries.
//!
//! An [`Entry`] is built once from a parsed [`FeedItem`]: every attribute is
//! resolved to its final type at construction, so reading an entry never
//! re-inspects XML. Missing or malformed attributes degrade to `None` (or
//! [`FieldValue::Absent`]); they are never errors.

use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::str::FromStr;

use crate::feed::{FeedItem, Geometry, GeometryKind, Point, XmlElement};

/// Attribution reported for every GDACS entry.
pub const ATTRIBUTION: &str = "Global Disaster Alert and Coordination System";

/// Category label for event-type codes missing from the profile table.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const TAG_ALERT_LEVEL: &str = "gdacs:alertlevel";
const TAG_COUNTRY: &str = "gdacs:country";
const TAG_DURATION_IN_WEEK: &str = "gdacs:durationinweek";
const TAG_EVENT_ID: &str = "gdacs:eventid";
const TAG_EVENT_NAME: &str = "gdacs:eventname";
const TAG_EVENT_TYPE: &str = "gdacs:eventtype";
const TAG_FROM_DATE: &str = "gdacs:fromdate";
const TAG_ICON: &str = "gdacs:icon";
const TAG_IS_CURRENT: &str = "gdacs:iscurrent";
const TAG_POPULATION: &str = "gdacs:population";
const TAG_SEVERITY: &str = "gdacs:severity";
const TAG_TEMPORARY: &str = "gdacs:temporary";
const TAG_TO_DATE: &str = "gdacs:todate";
const TAG_VERSION: &str = "gdacs:version";
const TAG_VULNERABILITY: &str = "gdacs:vulnerability";

/// A free-form attribute that GDACS publishes either as element text or as a
/// numeric `value` attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    Text(String),
    Numeric(f64),
    #[default]
    Absent,
}

impl FieldValue {
    /// Text content of an element, otherwise absent.
    fn text_of(element: Option<&XmlElement>) -> Self {
        element
            .and_then(|e| e.text.as_deref())
            .map_or(FieldValue::Absent, |t| FieldValue::Text(t.to_string()))
    }

    /// Text content first, then a numeric `value` attribute, otherwise absent.
    fn text_or_value(element: Option<&XmlElement>) -> Self {
        let Some(element) = element else {
            return FieldValue::Absent;
        };
        if let Some(text) = element.text.as_deref() {
            return FieldValue::Text(text.to_string());
        }
        element
            .attribute("value")
            .and_then(parse_number::<f64>)
            .map_or(FieldValue::Absent, FieldValue::Numeric)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Numeric(n) => write!(f, "{}", n),
            FieldValue::Absent => f.write_str("-"),
        }
    }
}

/// Feed-variant knobs: how event codes become categories and which
/// geometries count towards location and distance.
#[derive(Debug, Clone, Copy)]
pub struct EntryProfile {
    pub event_types: &'static [(&'static str, &'static str)],
    pub geometry_kinds: &'static [GeometryKind],
}

impl EntryProfile {
    /// The GDACS RSS feed.
    pub const GDACS: EntryProfile = EntryProfile {
        event_types: &[
            ("DR", "Drought"),
            ("EQ", "Earthquake"),
            ("FL", "Flood"),
            ("TC", "Tropical Cyclone"),
            ("TS", "Tsunami"),
            ("VO", "Volcano"),
        ],
        geometry_kinds: &[GeometryKind::Point, GeometryKind::Polygon],
    };

    /// Maps an event-type code to its label, [`UNKNOWN_CATEGORY`] otherwise.
    pub fn category_for(&self, code: Option<&str>) -> &'static str {
        code.and_then(|code| {
            self.event_types
                .iter()
                .find(|(known, _)| *known == code)
                .map(|(_, label)| *label)
        })
        .unwrap_or(UNKNOWN_CATEGORY)
    }

    fn accepts(&self, geometry: &Geometry) -> bool {
        self.geometry_kinds.contains(&geometry.kind())
    }
}

impl Default for EntryProfile {
    fn default() -> Self {
        Self::GDACS
    }
}

/// One disaster alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Identity within the feed: the guid, else the title.
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Accepted geometries in document order.
    pub geometries: Vec<Geometry>,
    /// Kilometres from the home location to the nearest accepted geometry.
    pub distance_to_home: Option<f64>,
    pub published: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
    /// Label from the event-type table, never empty.
    pub category: String,
    pub alert_level: Option<String>,
    pub country: Option<String>,
    /// 0 = first week of the event.
    pub duration_in_week: Option<u32>,
    pub event_id: Option<u64>,
    pub event_name: Option<String>,
    pub event_type_short: Option<String>,
    pub from_date: Option<DateTime<FixedOffset>>,
    pub to_date: Option<DateTime<FixedOffset>>,
    pub icon_url: Option<String>,
    pub is_current: Option<bool>,
    pub population: FieldValue,
    pub severity: FieldValue,
    pub temporary: Option<bool>,
    pub version: Option<u32>,
    pub vulnerability: FieldValue,
}

impl Entry {
    /// Builds an entry from a parsed item, measuring distances from `home`.
    pub fn new(item: FeedItem, home: &Point, profile: &EntryProfile) -> Self {
        let raw = |tag: &str| item.element(tag).and_then(|e| e.text.as_deref());
        let text = |tag: &str| raw(tag).map(str::to_string);
        let date = |tag: &str| raw(tag).and_then(parse_datetime);
        let flag = |tag: &str| raw(tag).and_then(parse_bool);

        let event_type_short = text(TAG_EVENT_TYPE);
        let category = profile.category_for(event_type_short.as_deref()).to_string();

        let geometries: Vec<Geometry> = item
            .geometries
            .iter()
            .filter(|g| profile.accepts(g))
            .cloned()
            .collect();
        let distance_to_home = geometries
            .iter()
            .filter_map(|g| g.distance_to(home))
            .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));

        let external_id = item
            .guid
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| item.title.clone());

        Entry {
            external_id,
            title: item.title.clone(),
            description: item.description.clone(),
            distance_to_home,
            published: item.published.as_deref().and_then(parse_datetime),
            updated: item.updated.as_deref().and_then(parse_datetime),
            category,
            alert_level: text(TAG_ALERT_LEVEL),
            country: text(TAG_COUNTRY),
            duration_in_week: raw(TAG_DURATION_IN_WEEK).and_then(parse_number),
            event_id: raw(TAG_EVENT_ID).and_then(parse_number),
            event_name: text(TAG_EVENT_NAME),
            event_type_short,
            from_date: date(TAG_FROM_DATE),
            to_date: date(TAG_TO_DATE),
            icon_url: text(TAG_ICON),
            is_current: flag(TAG_IS_CURRENT),
            population: FieldValue::text_of(item.element(TAG_POPULATION)),
            severity: FieldValue::text_of(item.element(TAG_SEVERITY)),
            temporary: flag(TAG_TEMPORARY),
            version: raw(TAG_VERSION).and_then(parse_number),
            vulnerability: FieldValue::text_or_value(item.element(TAG_VULNERABILITY)),
            geometries,
        }
    }

    /// `(latitude, longitude)` of the first accepted geometry.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.geometries
            .iter()
            .find_map(Geometry::location)
            .map(|p| p.as_tuple())
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.external_id {
            Some(id) => write!(f, "GdacsFeedEntry(id={})", id),
            None => write!(f, "GdacsFeedEntry(id=None)"),
        }
    }
}

/// Parses RFC 2822 (`pubDate` style), falling back to RFC 3339.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
}

/// Trimmed decimal; out-of-range or malformed values are absent.
fn parse_number<T: FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
