//! Normalize inbound envelopes into canonical internal Event models.

use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::types::{Event, InboundEvent};

/// Validate and normalize an InboundEvent into a canonical Event.
///
/// Only the envelope is validated; `data` is passed through untouched.
pub fn normalize(raw: &InboundEvent) -> Result<Event, EngineError> {
  let name = raw.name.trim().to_ascii_lowercase();
  if name.is_empty() {
    return Err(EngineError::validation("name", "must not be empty"));
  }
  let source = raw.source.trim().to_ascii_lowercase();
  if source.is_empty() {
    return Err(EngineError::validation("source", "must not be empty"));
  }

  let timestamp = match raw.timestamp.as_deref().map(str::trim) {
    None | Some("") => Utc::now(),
    Some(ts) => DateTime::parse_from_rfc3339(ts)
      .map_err(|e| EngineError::validation("timestamp", &format!("invalid RFC3339: {}", e)))?
      .with_timezone(&Utc),
  };

  Ok(Event {
    id: raw.id.clone().filter(|id| !id.is_empty()),
    name,
    source,
    timestamp,
    data: raw.data.clone(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn inbound(name: &str, source: &str) -> InboundEvent {
    InboundEvent {
      id: Some("evt-1".into()),
      name: name.into(),
      source: source.into(),
      timestamp: Some("2025-01-15T10:30:00Z".into()),
      data: json!({"ref": "refs/heads/main"}),
    }
  }

  #[test]
  fn normalize_rejects_empty_name() {
    let err = normalize(&inbound("  ", "github")).unwrap_err();
    assert!(err.to_string().contains("name"));
  }

  #[test]
  fn normalize_rejects_empty_source() {
    let err = normalize(&inbound("github.push", "")).unwrap_err();
    assert!(err.to_string().contains("source"));
  }

  #[test]
  fn normalize_valid_event() {
    let event = normalize(&inbound("GitHub.Push", "GitHub")).unwrap();
    assert_eq!(event.name, "github.push");
    assert_eq!(event.source, "github");
    assert_eq!(event.id.as_deref(), Some("evt-1"));
    assert_eq!(event.timestamp.to_rfc3339(), "2025-01-15T10:30:00+00:00");
    assert_eq!(event.data["ref"], "refs/heads/main");
  }

  #[test]
  fn missing_timestamp_defaults_to_now() {
    let mut raw = inbound("github.push", "github");
    raw.timestamp = None;
    let before = Utc::now();
    let event = normalize(&raw).unwrap();
    assert!(event.timestamp >= before);
  }

  #[test]
  fn invalid_timestamp_is_rejected() {
    let mut raw = inbound("github.push", "github");
    raw.timestamp = Some("not-a-date".into());
    let err = normalize(&raw).unwrap_err();
    assert!(err.to_string().contains("timestamp"));
  }
}
