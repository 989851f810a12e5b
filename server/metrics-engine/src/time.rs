//! Timestamp parsing for webhook payload fields.
//!
//! Webhook sources disagree on formats: GitHub sends RFC 3339, Jira sends
//! `2024-01-15T10:00:00.000+0000`, some CI systems send naive UTC strings or
//! epoch milliseconds.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S %z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp string, keeping the offset it was written in. Naive
/// strings are taken as UTC.
pub fn parse_str_local(s: &str) -> Option<DateTime<FixedOffset>> {
  let s = s.trim();
  if s.is_empty() {
    return None;
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt);
  }
  for fmt in OFFSET_FORMATS {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
      return Some(dt);
    }
  }
  for fmt in NAIVE_FORMATS {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(Utc.from_utc_datetime(&dt).fixed_offset());
    }
  }
  None
}

/// Parse a timestamp string in any supported format (UTC).
pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
  parse_str_local(s).map(|dt| dt.with_timezone(&Utc))
}

/// Parse a JSON timestamp: a string in any supported format, or epoch millis.
fn parse_value(v: &Value) -> Option<DateTime<FixedOffset>> {
  match v {
    Value::String(s) => parse_str_local(s),
    Value::Number(n) => n
      .as_i64()
      .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
      .map(|dt| dt.fixed_offset()),
    _ => None,
  }
}

/// Outcome of reading an optional timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Missing,
  Invalid,
  Parsed(DateTime<FixedOffset>),
}

impl Field {
  pub fn read(v: Option<&Value>) -> Self {
    match v {
      None | Some(Value::Null) => Self::Missing,
      Some(v) => parse_value(v).map(Self::Parsed).unwrap_or(Self::Invalid),
    }
  }
}

fn read_field(v: Option<&Value>, field: &str) -> Option<DateTime<FixedOffset>> {
  match Field::read(v) {
    Field::Parsed(ts) => Some(ts),
    Field::Missing => None,
    Field::Invalid => {
      warn!(field, raw = %v.map(serde_json::Value::to_string).unwrap_or_default(), "unparseable timestamp");
      None
    }
  }
}

/// Read a timestamp field; an unparseable value is logged and treated as absent.
pub fn read_logged(v: Option<&Value>, field: &str) -> Option<DateTime<Utc>> {
  read_field(v, field).map(|ts| ts.with_timezone(&Utc))
}

/// Calendar day of a timestamp field in the offset it was written in.
pub fn local_date_logged(v: Option<&Value>, field: &str) -> Option<NaiveDate> {
  read_field(v, field).map(|ts| ts.date_naive())
}

/// Seconds between two timestamp fields. `None` when either is missing or
/// unparseable (logged), or when `end` precedes `start`.
pub fn duration_seconds(
  start: Option<&Value>,
  end: Option<&Value>,
  start_field: &str,
  end_field: &str,
) -> Option<f64> {
  let start = read_logged(start, start_field)?;
  let end = read_logged(end, end_field)?;
  let millis = (end - start).num_milliseconds();
  if millis < 0 {
    debug!(start_field, end_field, "negative duration skipped");
    return None;
  }
  Some(millis as f64 / 1000.0)
}

/// Midnight UTC of the given day.
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
  Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
