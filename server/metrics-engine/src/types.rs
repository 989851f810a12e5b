//! Core types for the metrics engine (JSON contracts + internal models).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::naming::{self, MetricName};

// ---------------------------------------------------------------------------
// Inbound types (what the caller sends)
// ---------------------------------------------------------------------------

/// One already-parsed event envelope. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
  #[serde(default)]
  pub id: Option<String>,
  pub name: String,
  pub source: String,
  #[serde(default)]
  pub timestamp: Option<String>,
  #[serde(default)]
  pub data: Value,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// Canonical event after envelope validation. `data` is the raw payload tree;
/// classifiers read it through [`crate::payload`] and never fail on its shape.
#[derive(Debug, Clone)]
pub struct Event {
  pub id: Option<String>,
  pub name: String,
  pub source: String,
  pub timestamp: DateTime<Utc>,
  pub data: Value,
}

impl Event {
  /// Segment `i` of the name, if present and non-empty.
  pub fn segment(&self, i: usize) -> Option<&str> {
    self.name.split('.').nth(i).filter(|s| !s.is_empty())
  }
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// A dimension value. Booleans, dates and timestamps are stored as their
/// normalized string form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
  Text(String),
  Integer(i64),
  Float(f64),
}

impl DimensionValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl From<&str> for DimensionValue {
  fn from(s: &str) -> Self {
    Self::Text(s.to_string())
  }
}

impl From<String> for DimensionValue {
  fn from(s: String) -> Self {
    Self::Text(s)
  }
}

impl From<&String> for DimensionValue {
  fn from(s: &String) -> Self {
    Self::Text(s.clone())
  }
}

impl From<bool> for DimensionValue {
  fn from(b: bool) -> Self {
    Self::Text(if b { "true" } else { "false" }.to_string())
  }
}

impl From<i64> for DimensionValue {
  fn from(n: i64) -> Self {
    Self::Integer(n)
  }
}

impl From<u64> for DimensionValue {
  fn from(n: u64) -> Self {
    Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
  }
}

impl From<usize> for DimensionValue {
  fn from(n: usize) -> Self {
    Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
  }
}

impl From<f64> for DimensionValue {
  fn from(f: f64) -> Self {
    Self::Float(f)
  }
}

impl From<NaiveDate> for DimensionValue {
  fn from(d: NaiveDate) -> Self {
    Self::Text(d.format("%Y-%m-%d").to_string())
  }
}

impl From<DateTime<Utc>> for DimensionValue {
  fn from(ts: DateTime<Utc>) -> Self {
    Self::Text(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
  }
}

/// Dimension map. Every insert is normalized by key (see
/// [`naming::normalize_dimension_value`]); keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Dimensions(BTreeMap<String, DimensionValue>);

impl Dimensions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, key: &str, value: impl Into<DimensionValue>) {
    let normalized = naming::normalize_dimension_value(key, value.into());
    self.0.insert(key.to_string(), normalized);
  }

  pub fn with(mut self, key: &str, value: impl Into<DimensionValue>) -> Self {
    self.insert(key, value);
    self
  }

  /// Text value of a dimension, if it is text.
  pub fn text(&self, key: &str) -> Option<&str> {
    self.0.get(key).and_then(DimensionValue::as_str)
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &DimensionValue)> {
    self.0.iter()
  }
}

// ---------------------------------------------------------------------------
// Output types (what we emit)
// ---------------------------------------------------------------------------

/// One emitted metric. Created fresh per classification and never mutated
/// after it is handed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDefinition {
  #[serde(serialize_with = "serialize_name")]
  pub name: MetricName,
  pub value: f64,
  pub dimensions: Dimensions,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<DateTime<Utc>>,
}

fn serialize_name<S: serde::Serializer>(name: &MetricName, s: S) -> Result<S::Ok, S::Error> {
  s.collect_str(name)
}

impl MetricDefinition {
  /// Full dotted name, e.g. `github.push.total`.
  pub fn full_name(&self) -> String {
    self.name.to_string()
  }
}

/// Result of classifying one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationResult {
  pub metrics: Vec<MetricDefinition>,
}

impl ClassificationResult {
  pub fn new(metrics: Vec<MetricDefinition>) -> Self {
    Self { metrics }
  }

  pub fn is_empty(&self) -> bool {
    self.metrics.is_empty()
  }

  /// All metrics with the given full name, in emission order.
  pub fn named<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a MetricDefinition> + 'b
  where
    'a: 'b,
  {
    self.metrics.iter().filter(move |m| m.full_name() == name)
  }

  /// First metric with the given full name.
  pub fn first(&self, name: &str) -> Option<&MetricDefinition> {
    self.named(name).next()
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// One output line for a classified event.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedOutput {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event_id: Option<String>,
  pub event: String,
  pub metrics: Vec<MetricDefinition>,
}

/// Structured error output for invalid input lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
