//! Metric naming rules: `source.entity.action[.detail]` names checked against a
//! per-source vocabulary, plus the dimension-value normalization every
//! classifier goes through.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::time;
use crate::types::DimensionValue;

/// Default for any dimension the payload does not carry.
pub const UNKNOWN: &str = "unknown";
/// Default action when the event name / webhook carries none.
pub const TOTAL: &str = "total";
/// Placeholder for an absent optional dimension (e.g. commit scope).
pub const NONE: &str = "none";
/// Directory assigned to files at the repository root.
pub const ROOT: &str = "root";
/// Vocabulary entry accepting any well-formed segment.
pub const WILDCARD: &str = "*";

const BOOLEAN_KEYS: &[&str] = &[
  "conventional",
  "breaking",
  "success",
  "merged",
  "draft",
  "forced",
  "created",
  "deleted",
  "private",
  "is_default_branch",
];

const DATE_KEYS: &[&str] = &["date", "commit_date", "delivery_date"];

/// Parsed components of a metric name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetricName {
  pub source: String,
  pub entity: String,
  pub action: String,
  pub detail: Option<String>,
}

impl fmt::Display for MetricName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.source, self.entity, self.action)?;
    if let Some(detail) = &self.detail {
      write!(f, ".{}", detail)?;
    }
    Ok(())
  }
}

/// Allowed actions and details for one entity. Empty `details` means the name
/// must stop at the action segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityVocabulary {
  #[serde(default)]
  pub actions: BTreeSet<String>,
  #[serde(default)]
  pub details: BTreeSet<String>,
}

impl EntityVocabulary {
  fn allows_action(&self, action: &str) -> bool {
    self.actions.contains(WILDCARD) || self.actions.contains(action)
  }

  fn allows_detail(&self, detail: &str) -> bool {
    self.details.contains(WILDCARD) || self.details.contains(detail)
  }
}

/// source -> entity -> allowed actions/details. Serialized as a plain nested
/// map so it can be extended from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
  sources: BTreeMap<String, BTreeMap<String, EntityVocabulary>>,
}

impl Vocabulary {
  pub fn empty() -> Self {
    Self::default()
  }

  /// The vocabulary shipped with the engine.
  pub fn builtin() -> Self {
    let mut v = Self::empty();

    v.register(
      "github",
      "push",
      &[
        "total",
        "branch_activity",
        "commits",
        "by_author",
        "unique_authors",
        "commit_type",
        "breaking_change",
        "files_added",
        "files_modified",
        "files_removed",
        "directory_hotspot",
        "directory_changes",
        "filetype_hotspot",
        "filetype_changes",
        "code_additions",
        "code_deletions",
        "code_churn",
      ],
      &[],
    );
    v.register("github", "commit_volume", &["daily"], &[]);
    for entity in [
      "pull_request",
      "issues",
      "create",
      "delete",
      "deployment",
      "deployment_status",
      "workflow_dispatch",
      "repository",
    ] {
      v.register("github", entity, &[WILDCARD], &[]);
    }
    for entity in ["check_run", "check_suite", "workflow_run", "workflow_job"] {
      v.register("github", entity, &[WILDCARD], &[WILDCARD]);
    }
    v.register(
      "github",
      "workflow_step",
      &["test", "build", "deploy", "check", "install", "publish"],
      &["duration", "success", "failure"],
    );
    v.register("github", "ci", &["build", "deploy", "test", "lead_time"], &[WILDCARD]);
    v.register("github", WILDCARD, &[WILDCARD], &[]);

    v.register("dora", "deployment", &["attempt", "failure", "success"], &[]);

    for entity in ["build", "deploy", "test"] {
      v.register("ci", entity, &[WILDCARD], &[]);
    }
    v.register("ci", "lead_time", &["seconds"], &[]);

    for entity in ["issue", "sprint", "worklog", "comment", WILDCARD] {
      v.register("jira", entity, &[WILDCARD], &[]);
    }

    v.register(
      "bitbucket",
      "push",
      &[
        "total",
        "commits",
        "by_author",
        "unique_authors",
        "branch_activity",
        "commit_type",
        "breaking_change",
      ],
      &[],
    );
    for entity in ["pull_request", "build", WILDCARD] {
      v.register("bitbucket", entity, &[WILDCARD], &[]);
    }

    v.register("gitlab", WILDCARD, &[WILDCARD], &[]);
    v.register("task", WILDCARD, &[WILDCARD], &[]);
    v
  }

  /// Add actions/details to an entity, creating source and entity as needed.
  pub fn register(&mut self, source: &str, entity: &str, actions: &[&str], details: &[&str]) {
    let e = self
      .sources
      .entry(source.to_string())
      .or_default()
      .entry(entity.to_string())
      .or_default();
    e.actions.extend(actions.iter().map(|a| a.to_string()));
    e.details.extend(details.iter().map(|d| d.to_string()));
  }

  /// Union `other` into `self`.
  pub fn merge(&mut self, other: &Vocabulary) {
    for (source, entities) in &other.sources {
      let target = self.sources.entry(source.clone()).or_default();
      for (entity, vocab) in entities {
        let e = target.entry(entity.clone()).or_default();
        e.actions.extend(vocab.actions.iter().cloned());
        e.details.extend(vocab.details.iter().cloned());
      }
    }
  }

  pub fn has_source(&self, source: &str) -> bool {
    self.sources.contains_key(source)
  }

  fn entity(&self, source: &str, entity: &str, wildcard: bool) -> Option<&EntityVocabulary> {
    let entities = self.sources.get(source)?;
    entities
      .get(entity)
      .or_else(|| wildcard.then(|| entities.get(WILDCARD)).flatten())
  }
}

/// Builds, validates and parses metric names against a vocabulary.
#[derive(Debug, Clone)]
pub struct MetricNamingRules {
  vocabulary: Vocabulary,
}

impl Default for MetricNamingRules {
  fn default() -> Self {
    Self::new(Vocabulary::builtin())
  }
}

impl MetricNamingRules {
  pub fn new(vocabulary: Vocabulary) -> Self {
    Self { vocabulary }
  }

  /// Build a name, failing when any segment is malformed or not registered.
  /// The entity must be listed for its source; a `*` entity does not cover it.
  pub fn build(
    &self,
    source: &str,
    entity: &str,
    action: &str,
    detail: Option<&str>,
  ) -> Result<MetricName, EngineError> {
    self.build_checked(source, entity, action, detail, false)
  }

  /// Like [`build`](Self::build), but a source's `*` entity accepts any
  /// entity. For names derived from the event name itself.
  pub fn build_generic(&self, source: &str, entity: &str, action: &str) -> Result<MetricName, EngineError> {
    self.build_checked(source, entity, action, None, true)
  }

  fn build_checked(
    &self,
    source: &str,
    entity: &str,
    action: &str,
    detail: Option<&str>,
    wildcard_entity: bool,
  ) -> Result<MetricName, EngineError> {
    let name = MetricName {
      source: source.to_string(),
      entity: entity.to_string(),
      action: action.to_string(),
      detail: detail.map(str::to_string),
    };
    self
      .check(&name, wildcard_entity)
      .map_err(|reason| EngineError::invalid_name(name.to_string(), reason))?;
    Ok(name)
  }

  pub fn is_valid(&self, name: &str) -> bool {
    self.parse(name).is_some()
  }

  /// Inverse of [`build`](Self::build) and [`build_generic`](Self::build_generic);
  /// `None` for anything neither would produce.
  pub fn parse(&self, name: &str) -> Option<MetricName> {
    let segments: Vec<&str> = name.split('.').collect();
    let parsed = match segments.as_slice() {
      [source, entity, action] => MetricName {
        source: source.to_string(),
        entity: entity.to_string(),
        action: action.to_string(),
        detail: None,
      },
      [source, entity, action, detail] => MetricName {
        source: source.to_string(),
        entity: entity.to_string(),
        action: action.to_string(),
        detail: Some(detail.to_string()),
      },
      _ => return None,
    };
    self.check(&parsed, true).ok().map(|_| parsed)
  }

  fn check(&self, name: &MetricName, wildcard_entity: bool) -> Result<(), String> {
    let segments = [
      Some(name.source.as_str()),
      Some(name.entity.as_str()),
      Some(name.action.as_str()),
      name.detail.as_deref(),
    ];
    for segment in segments.into_iter().flatten() {
      if !is_token(segment) {
        return Err(format!("segment {:?} must match [a-z0-9_]+", segment));
      }
    }
    if !self.vocabulary.has_source(&name.source) {
      return Err(format!("unregistered source {:?}", name.source));
    }
    let entity = self
      .vocabulary
      .entity(&name.source, &name.entity, wildcard_entity)
      .ok_or_else(|| format!("unregistered entity {:?}", name.entity))?;
    if !entity.allows_action(&name.action) {
      return Err(format!("unregistered action {:?}", name.action));
    }
    if let Some(detail) = &name.detail {
      if !entity.allows_detail(detail) {
        return Err(format!("unregistered detail {:?}", detail));
      }
    }
    Ok(())
  }
}

pub(crate) fn is_token(s: &str) -> bool {
  !s.is_empty()
    && s
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Turn a payload-derived value into a well-formed name segment:
/// lowercase, anything outside `[a-z0-9_]` becomes `_`, empty -> `unknown`.
pub fn token(raw: &str) -> String {
  let mapped: String = raw
    .trim()
    .to_lowercase()
    .chars()
    .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
    .collect();
  let trimmed = mapped.trim_matches('_');
  if trimmed.is_empty() {
    UNKNOWN.to_string()
  } else {
    trimmed.to_string()
  }
}

/// Normalize a dimension value according to its key.
///
/// - boolean keys serialize to `"true"` / `"false"` (numbers: non-zero is true;
///   strings: true/yes/y/t/on/1)
/// - date keys format as `YYYY-MM-DD`
/// - `*_at` / `timestamp` keys format as RFC 3339
/// - `repository` values without an owner get `unknown/` prepended
pub fn normalize_dimension_value(key: &str, value: DimensionValue) -> DimensionValue {
  if BOOLEAN_KEYS.contains(&key) {
    return DimensionValue::from(is_truthy(&value));
  }
  if DATE_KEYS.contains(&key) {
    return match &value {
      DimensionValue::Text(s) => format_date(s).map(DimensionValue::Text).unwrap_or(value),
      _ => value,
    };
  }
  if key == "timestamp" || key.ends_with("_at") {
    return match &value {
      DimensionValue::Text(s) => time::parse_str(s)
        .map(|ts| DimensionValue::Text(ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(value),
      _ => value,
    };
  }
  if key == "repository" {
    return match value {
      DimensionValue::Text(s) if !s.contains('/') => DimensionValue::Text(format!("{}/{}", UNKNOWN, s)),
      other => other,
    };
  }
  value
}

fn is_truthy(value: &DimensionValue) -> bool {
  match value {
    DimensionValue::Text(s) => matches!(
      s.trim().to_ascii_lowercase().as_str(),
      "true" | "yes" | "y" | "t" | "on" | "1"
    ),
    DimensionValue::Integer(n) => *n != 0,
    DimensionValue::Float(f) => *f != 0.0,
  }
}

fn format_date(s: &str) -> Option<String> {
  if let Ok(d) = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
    return Some(d.format("%Y-%m-%d").to_string());
  }
  time::parse_str_local(s).map(|ts| ts.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rules() -> MetricNamingRules {
    MetricNamingRules::default()
  }

  #[test]
  fn build_and_display() {
    let name = rules().build("github", "push", "total", None).unwrap();
    assert_eq!(name.to_string(), "github.push.total");
    let name = rules()
      .build("github", "workflow_run", "conclusion", Some("success"))
      .unwrap();
    assert_eq!(name.to_string(), "github.workflow_run.conclusion.success");
  }

  #[test]
  fn parse_inverts_build() {
    let r = rules();
    let built = r.build("github", "ci", "deploy", Some("failed")).unwrap();
    assert_eq!(r.parse(&built.to_string()), Some(built));
  }

  #[test]
  fn rejects_unregistered_segments() {
    let r = rules();
    assert!(r.build("github", "push", "nonsense", None).is_err());
    assert!(r.build("nosuch", "push", "total", None).is_err());
    assert!(r.build("dora", "incident", "total", None).is_err());
    assert!(r.build("github", "push", "total", Some("extra")).is_err());
    assert!(!r.is_valid("github.push"));
    assert!(!r.is_valid("github.push.total.a.b"));
    assert!(!r.is_valid("github.Push.total"));
  }

  #[test]
  fn wildcard_entity_accepts_unlisted_event_types() {
    let r = rules();
    assert!(r.is_valid("github.star.created"));
    assert!(r.is_valid("bitbucket.issue.total"));
    assert!(!r.is_valid("dora.star.created"));
    let generic = r.build_generic("github", "star", "created").unwrap();
    assert_eq!(r.parse("github.star.created"), Some(generic));
  }

  #[test]
  fn build_requires_a_listed_entity() {
    let r = rules();
    assert!(r.build("github", "pull_requst", "total", None).is_err());
    assert!(r.build("jira", "isue", "created", None).is_err());
    assert!(r.build("gitlab", "pipeline", "total", None).is_err());
    assert!(r.build("github", "pull_request", "opened", None).is_ok());
    assert!(r.build_generic("gitlab", "pipeline", "total").is_ok());
    assert!(r.build_generic("dora", "incident", "total").is_err());
  }

  #[test]
  fn merge_extends_vocabulary() {
    let mut vocab = Vocabulary::builtin();
    let mut extra = Vocabulary::empty();
    extra.register("dora", "incident", &["opened", "resolved"], &[]);
    vocab.merge(&extra);
    let r = MetricNamingRules::new(vocab);
    assert!(r.is_valid("dora.incident.opened"));
    assert!(r.is_valid("dora.deployment.attempt"));
  }

  #[test]
  fn token_sanitizes_payload_values() {
    assert_eq!(token("Ready For Review"), "ready_for_review");
    assert_eq!(token("timed-out"), "timed_out");
    assert_eq!(token("   "), "unknown");
    assert_eq!(token("SUCCESSFUL"), "successful");
  }

  #[test]
  fn repository_normalization() {
    assert_eq!(
      normalize_dimension_value("repository", "my-repo".into()),
      DimensionValue::from("unknown/my-repo")
    );
    assert_eq!(
      normalize_dimension_value("repository", "org/my-repo".into()),
      DimensionValue::from("org/my-repo")
    );
  }

  #[test]
  fn boolean_normalization_accepts_loose_inputs() {
    let t = DimensionValue::from("true");
    let f = DimensionValue::from("false");
    assert_eq!(normalize_dimension_value("merged", DimensionValue::Integer(1)), t);
    assert_eq!(normalize_dimension_value("merged", DimensionValue::Integer(0)), f);
    assert_eq!(normalize_dimension_value("draft", "yes".into()), t);
    assert_eq!(normalize_dimension_value("draft", "no".into()), f);
    assert_eq!(normalize_dimension_value("conventional", true.into()), t);
  }

  #[test]
  fn date_and_timestamp_normalization() {
    assert_eq!(
      normalize_dimension_value("commit_date", "2024-03-05T23:10:00Z".into()),
      DimensionValue::from("2024-03-05")
    );
    assert_eq!(
      normalize_dimension_value("commit_date", "2024-03-05T23:10:00-05:00".into()),
      DimensionValue::from("2024-03-05")
    );
    assert_eq!(
      normalize_dimension_value("merged_at", "2024-03-05T23:10:00+01:00".into()),
      DimensionValue::from("2024-03-05T22:10:00Z")
    );
    assert_eq!(
      normalize_dimension_value("date", "not a date".into()),
      DimensionValue::from("not a date")
    );
  }
}
