//! Jira webhook classification.
//!
//! Names arrive as `jira.issue.created`, `jira.issue_created` or
//! `jira.jira:issue_created`; all three route the same way. When the name only
//! says `jira`, the payload `webhookEvent` is used.

use std::sync::Arc;

use serde_json::Value;

use super::{split_route, SourceClassifier};
use crate::dimensions;
use crate::emit::Emitter;
use crate::error::EngineError;
use crate::naming::{token, MetricNamingRules, TOTAL, UNKNOWN};
use crate::payload;
use crate::time;
use crate::types::{Dimensions, Event, MetricDefinition};

const ENTITIES: &[&str] = &["issue", "sprint", "worklog", "comment"];

/// `(entity, action)` tokens for a Jira event; action defaults to `total`.
fn route(event: &Event) -> (String, String) {
  let (mut entity, mut action) = split_route(event, ENTITIES);
  if entity.as_deref() == Some("jira") {
    entity = action.take();
  }
  if let Some(e) = entity.clone() {
    if let Some(act) = ENTITIES
      .iter()
      .find_map(|known| e.strip_prefix(known).and_then(|rest| rest.strip_prefix('_')))
    {
      if action.is_none() {
        let known = &e[..e.len() - act.len() - 1];
        entity = Some(known.to_string());
        action = Some(act.to_string());
      }
    }
  }
  if entity.is_none() {
    if let Some(hook) = payload::string(&event.data, &["webhookEvent"]) {
      let hook = hook.strip_prefix("jira:").unwrap_or(&hook).to_string();
      for known in ENTITIES {
        if let Some(act) = hook.strip_prefix(known).and_then(|rest| rest.strip_prefix('_')) {
          entity = Some(known.to_string());
          action = Some(act.to_string());
          break;
        }
      }
    }
  }
  (
    entity.map(|e| token(&e)).unwrap_or_else(|| UNKNOWN.to_string()),
    action.map(|a| token(&a)).unwrap_or_else(|| TOTAL.to_string()),
  )
}

pub struct JiraEventClassifier {
  rules: Arc<MetricNamingRules>,
}

impl JiraEventClassifier {
  pub fn new(rules: Arc<MetricNamingRules>) -> Self {
    Self { rules }
  }
}

impl Default for JiraEventClassifier {
  fn default() -> Self {
    Self::new(Arc::new(MetricNamingRules::default()))
  }
}

impl SourceClassifier for JiraEventClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    let mut out = Emitter::new(&self.rules, "jira");
    let (entity, action) = route(event);
    let base = dimensions::jira_dimensions(event);
    match entity.as_str() {
      "issue" => issue(event, &action, base, &mut out)?,
      "sprint" => sprint(event, &action, &mut out)?,
      "worklog" => worklog(event, &action, base, &mut out)?,
      "comment" => {
        let dims = base.with("action", action.as_str());
        out.count("comment", TOTAL, dims.clone())?;
        if action != TOTAL {
          out.count("comment", &action, dims)?;
        }
      }
      other => out.count_if_registered(other, &action, base),
    }
    Ok(out.finish())
  }
}

fn issue(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let fields = payload::dig(data, &["issue", "fields"]).unwrap_or(&Value::Null);
  let assignee = payload::first_string(fields, &[&["assignee", "displayName"], &["assignee", "name"]])
    .unwrap_or_else(|| UNKNOWN.to_string());
  let dims = base.with("assignee", assignee.as_str());
  let with_action = dims.clone().with("action", action);

  out.count("issue", TOTAL, with_action.clone())?;
  if action != TOTAL {
    out.count("issue", action, with_action)?;
  }
  out.count("issue", "by_assignee", dims.clone())?;

  let mut status_changed = false;
  for item in payload::array(data, &["changelog", "items"]) {
    if payload::string(item, &["field"]).as_deref() != Some("status") {
      continue;
    }
    status_changed = true;
    let transition = dims
      .clone()
      .with(
        "from",
        payload::string(item, &["fromString"]).unwrap_or_else(|| UNKNOWN.to_string()),
      )
      .with(
        "to",
        payload::string(item, &["toString"]).unwrap_or_else(|| UNKNOWN.to_string()),
      );
    out.count("issue", "status_changed", transition)?;
  }

  let resolved_now = payload::dig(fields, &["resolutiondate"]).is_some() && (status_changed || action == "resolved");
  if resolved_now {
    if action != "resolved" {
      out.count("issue", "resolved", dims.clone())?;
    }
    if let Some(secs) = time::duration_seconds(
      payload::dig(fields, &["created"]),
      payload::dig(fields, &["resolutiondate"]),
      "issue.fields.created",
      "issue.fields.resolutiondate",
    ) {
      out.emit("issue", "cycle_time", None, secs, dims)?;
    }
  }
  Ok(())
}

fn sprint(event: &Event, action: &str, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let sprint = payload::dig(&event.data, &["sprint"]).unwrap_or(&Value::Null);
  let dims = Dimensions::new()
    .with(
      "sprint",
      payload::string(sprint, &["name"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "board",
      payload::string(sprint, &["originBoardId"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "state",
      payload::string(sprint, &["state"]).unwrap_or_else(|| UNKNOWN.to_string()),
    );

  out.count("sprint", TOTAL, dims.clone().with("action", action))?;
  if action != TOTAL {
    out.count("sprint", action, dims.clone())?;
  }
  if action == "closed" {
    let end = payload::dig(sprint, &["completeDate"]).or_else(|| payload::dig(sprint, &["endDate"]));
    if let Some(secs) = time::duration_seconds(
      payload::dig(sprint, &["startDate"]),
      end,
      "sprint.startDate",
      "sprint.completeDate",
    ) {
      out.emit("sprint", "duration", None, secs, dims)?;
    }
  }
  Ok(())
}

fn worklog(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let log = payload::dig(&event.data, &["worklog"]).unwrap_or(&Value::Null);
  let dims = base.with(
    "author",
    payload::first_string(log, &[&["author", "displayName"], &["author", "name"]])
      .unwrap_or_else(|| UNKNOWN.to_string()),
  );
  out.count("worklog", TOTAL, dims.clone().with("action", action))?;
  if action != TOTAL {
    out.count("worklog", action, dims.clone())?;
  }
  if let Some(secs) = payload::float(log, &["timeSpentSeconds"]).filter(|s| *s >= 0.0) {
    out.emit("worklog", "time_spent", None, secs, dims)?;
  }
  Ok(())
}

/// Minimal issue/sprint classification the dispatcher uses when no Jira
/// classifier is configured.
pub struct JiraFallbackClassifier {
  rules: Arc<MetricNamingRules>,
}

impl JiraFallbackClassifier {
  pub fn new(rules: Arc<MetricNamingRules>) -> Self {
    Self { rules }
  }
}

impl SourceClassifier for JiraFallbackClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    let mut out = Emitter::new(&self.rules, "jira");
    let (entity, action) = route(event);
    match entity.as_str() {
      "issue" => {
        let project = payload::first_string(&event.data, &[&["issue", "fields", "project", "key"]])
          .unwrap_or_else(|| UNKNOWN.to_string());
        out.count("issue", &action, Dimensions::new().with("project", project))?;
      }
      "sprint" => {
        let sprint = payload::string(&event.data, &["sprint", "name"]).unwrap_or_else(|| UNKNOWN.to_string());
        out.count("sprint", &action, Dimensions::new().with("sprint", sprint))?;
      }
      _ => {}
    }
    Ok(out.finish())
  }
}
