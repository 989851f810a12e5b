//! Bitbucket Cloud webhook classification.
//!
//! Bitbucket names its events `repo:push`, `pullrequest:fulfilled`,
//! `repo:commit_status_updated`; the dotted forms route the same way.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use super::{ci, split_route, SourceClassifier};
use crate::commit;
use crate::dimensions;
use crate::emit::Emitter;
use crate::error::EngineError;
use crate::naming::{token, MetricNamingRules, TOTAL, UNKNOWN};
use crate::payload;
use crate::time;
use crate::types::{Dimensions, Event, MetricDefinition};

pub struct BitbucketEventClassifier {
  rules: Arc<MetricNamingRules>,
}

impl BitbucketEventClassifier {
  pub fn new(rules: Arc<MetricNamingRules>) -> Self {
    Self { rules }
  }
}

impl Default for BitbucketEventClassifier {
  fn default() -> Self {
    Self::new(Arc::new(MetricNamingRules::default()))
  }
}

impl SourceClassifier for BitbucketEventClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    let mut out = Emitter::new(&self.rules, "bitbucket");
    let (entity, action) = split_route(event, &["pullrequest", "pull_request", "commit_status"]);
    let entity = entity.map(|e| token(&e)).unwrap_or_else(|| UNKNOWN.to_string());
    let action = action.map(|a| token(&a));
    let base = dimensions::bitbucket_dimensions(event);

    match (entity.as_str(), action.as_deref()) {
      ("repo", Some("push")) | ("push", _) => push(event, base, &mut out)?,
      ("pullrequest" | "pull_request", act) => pull_request(event, act, base, &mut out)?,
      ("repo", Some(act)) if act.starts_with("commit_status") => build(event, base, &mut out)?,
      ("commit_status" | "build", _) => build(event, base, &mut out)?,
      (other, act) => out.count_if_registered(other, act.unwrap_or(TOTAL), base),
    }
    Ok(out.finish())
  }
}

fn push(event: &Event, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let changes = payload::array(data, &["push", "changes"]);
  let actor = payload::first_string(data, &[&["actor", "display_name"], &["actor", "nickname"]])
    .unwrap_or_else(|| UNKNOWN.to_string());
  let branch = changes
    .iter()
    .find_map(|c| {
      payload::first_string(c, &[&["new", "name"], &["old", "name"]]).map(|name| {
        match payload::string(c, &["new", "type"]).as_deref() {
          Some("tag") => format!("tag:{}", name),
          _ => name,
        }
      })
    })
    .unwrap_or_else(|| UNKNOWN.to_string());
  let commits: Vec<&Value> = changes
    .iter()
    .flat_map(|c| payload::array(c, &["commits"]))
    .collect();

  let dims = base.with("branch", branch.as_str());
  out.count("push", TOTAL, dims.clone())?;
  out.emit("push", "commits", None, commits.len() as f64, dims.clone())?;
  out.count("push", "by_author", dims.clone().with("author", actor.as_str()))?;
  out.count("push", "branch_activity", dims.clone())?;

  if commits.is_empty() {
    return Ok(());
  }
  let authors: BTreeSet<String> = commits.iter().map(|c| dimensions::commit_author(c)).collect();
  out.emit("push", "unique_authors", None, authors.len() as f64, dims.clone())?;

  // Bitbucket lists commits newest first.
  let message = payload::string(commits[0], &["message"]).unwrap_or_default();
  let parts = commit::parse(&message);
  if let Some(commit_type) = parts.commit_type.as_deref() {
    let mut typed = dims.clone().with("type", commit_type).with("conventional", parts.conventional);
    if let Some(scope) = parts.scope.as_deref() {
      typed.insert("scope", scope);
    }
    out.count("push", "commit_type", typed)?;
  }
  if parts.breaking {
    out.count("push", "breaking_change", dims.with("author", actor))?;
  }
  Ok(())
}

fn pull_request(
  event: &Event,
  action: Option<&str>,
  base: Dimensions,
  out: &mut Emitter<'_>,
) -> Result<(), EngineError> {
  let pr = payload::dig(&event.data, &["pullrequest"]).unwrap_or(&Value::Null);
  let action = match action {
    Some("fulfilled") => "merged".to_string(),
    Some("rejected") => "declined".to_string(),
    Some(other) => other.to_string(),
    None => payload::string(pr, &["state"])
      .map(|s| match s.to_ascii_uppercase().as_str() {
        "MERGED" => "merged".to_string(),
        "DECLINED" => "declined".to_string(),
        _ => token(&s),
      })
      .unwrap_or_else(|| TOTAL.to_string()),
  };
  let author = payload::first_string(pr, &[&["author", "display_name"], &["author", "nickname"]])
    .unwrap_or_else(|| UNKNOWN.to_string());
  let dims = base.with(
    "target_branch",
    payload::string(pr, &["destination", "branch", "name"]).unwrap_or_else(|| UNKNOWN.to_string()),
  );

  out.count("pull_request", TOTAL, dims.clone().with("action", action.as_str()))?;
  if action != TOTAL {
    out.count("pull_request", &action, dims.clone())?;
  }
  out.count("pull_request", "by_author", dims.clone().with("author", author.as_str()))?;
  if action == "merged" {
    if let Some(secs) = time::duration_seconds(
      payload::dig(pr, &["created_on"]),
      payload::dig(pr, &["updated_on"]),
      "pullrequest.created_on",
      "pullrequest.updated_on",
    ) {
      out.emit("pull_request", "time_to_merge", None, secs, dims.with("author", author))?;
    }
  }
  Ok(())
}

fn build(event: &Event, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let status = payload::dig(&event.data, &["commit_status"]).unwrap_or(&Value::Null);
  let state = payload::string(status, &["state"]).unwrap_or_else(|| UNKNOWN.to_string());
  let state = match state.to_ascii_uppercase().as_str() {
    "SUCCESSFUL" => "completed".to_string(),
    "FAILED" => "failed".to_string(),
    "INPROGRESS" => "in_progress".to_string(),
    _ => ci::map_status(&state),
  };
  let mut dims = base.with("status", state.as_str());
  if let Some(name) = payload::string(status, &["name"]) {
    dims.insert("pipeline", name);
  }
  if let Some(refname) = payload::string(status, &["refname"]) {
    dims.insert("branch", refname);
  }
  out.count("build", TOTAL, dims.clone())?;
  out.count("build", &state, dims)
}
