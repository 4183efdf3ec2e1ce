//! locates the timestamp of an event and renders it as local wall clock time

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::{error::TimestampError, event::RawEvent};

/// returned instead of a time if the event carries no timestamp at all
pub const NO_TIMESTAMP: &str = "no timestamp";

/// formats without offset information, interpreted as utc
const NAIVE_FORMATS: &[&str] =
	&["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// formats carrying a numeric offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Finds the timestamp value of an event. First match wins:
/// `data.timestamp`, `data.time`, top level `time`.
pub fn locate(event: &RawEvent) -> Option<&Value> {
	let data = event.data().ok();

	data.and_then(|data| data.get("timestamp"))
		.or_else(|| data.and_then(|data| data.get("time")))
		.or_else(|| event.payload().get("time"))
}

/// Normalizes the timestamp of an event into `HH:MM:SS` in the given zone.
///
/// Returns [NO_TIMESTAMP] if no timestamp key exists. A present but
/// unparseable timestamp is an error.
pub fn normalize_in<Tz>(event: &RawEvent, zone: &Tz) -> Result<String, TimestampError>
where
	Tz: TimeZone,
	Tz::Offset: std::fmt::Display,
{
	let value = match locate(event) {
		Some(value) => value,
		None => return Ok(NO_TIMESTAMP.to_owned()),
	};

	let text = value.as_str().ok_or_else(|| TimestampError::NotAString(value.to_string()))?;

	Ok(parse_instant(text)?.with_timezone(zone).format("%H:%M:%S").to_string())
}

/// [normalize_in] for the zone of the host
pub fn normalize(event: &RawEvent) -> Result<String, TimestampError> {
	normalize_in(event, &chrono::Local)
}

/// parses an instant, assuming utc unless the text carries an offset
pub fn parse_instant(text: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
	let trimmed = text.trim();
	let trimmed = trimmed.strip_suffix(" UTC").or_else(|| trimmed.strip_suffix("UTC")).unwrap_or(trimmed);

	if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
		return Ok(instant);
	}

	if let Ok(instant) = DateTime::parse_from_rfc2822(trimmed) {
		return Ok(instant);
	}

	if let Some(instant) =
		OFFSET_FORMATS.iter().find_map(|format| DateTime::parse_from_str(trimmed, format).ok())
	{
		return Ok(instant);
	}

	NAIVE_FORMATS
		.iter()
		.find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
		.map(|naive| Utc.from_utc_datetime(&naive).into())
		.ok_or_else(|| TimestampError::Unparseable(text.to_owned()))
}
