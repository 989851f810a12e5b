//! GitHub webhook classification.
//!
//! `github.<event_type>[.<action>]` routes to one handler per event type. The
//! action falls back to the payload `action` field, then to `total`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use super::ci::{self, Layout};
use super::SourceClassifier;
use crate::commit;
use crate::config::Config;
use crate::dimensions;
use crate::emit::Emitter;
use crate::error::EngineError;
use crate::naming::{token, MetricNamingRules, NONE, TOTAL, UNKNOWN};
use crate::paths;
use crate::payload;
use crate::time;
use crate::types::{Dimensions, Event, MetricDefinition};

pub struct GithubEventClassifier {
  rules: Arc<MetricNamingRules>,
  config: Arc<Config>,
}

impl GithubEventClassifier {
  pub fn new(rules: Arc<MetricNamingRules>, config: Arc<Config>) -> Self {
    Self { rules, config }
  }
}

impl Default for GithubEventClassifier {
  fn default() -> Self {
    let config = Config::default();
    Self::new(Arc::new(MetricNamingRules::new(config.vocabulary())), Arc::new(config))
  }
}

impl SourceClassifier for GithubEventClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    let mut out = Emitter::new(&self.rules, "github");
    let base = dimensions::github_dimensions(event);
    let event_type = event.segment(1).unwrap_or(UNKNOWN);

    if event_type == "ci" {
      ci::classify(event, event.segment(2), Layout::Nested, base, &mut out)?;
      return Ok(out.finish());
    }

    let action = event
      .segment(2)
      .map(str::to_string)
      .or_else(|| payload::string(&event.data, &["action"]))
      .map(|a| token(&a))
      .unwrap_or_else(|| TOTAL.to_string());

    match event_type {
      "push" => push(event, base, &mut out)?,
      "pull_request" => pull_request(event, &action, base, &mut out)?,
      "issues" => issues(event, &action, base, &mut out)?,
      "check_run" | "check_suite" => check(event, event_type, &action, base, &mut out)?,
      "create" | "delete" => reference(event, event_type, base, &mut out)?,
      "deployment" => deployment(event, &action, base, &mut out)?,
      "deployment_status" => deployment_status(event, base, &mut out)?,
      "workflow_run" => workflow_run(event, &action, base, &mut out)?,
      "workflow_job" => self.workflow_job(event, &action, base, &mut out)?,
      "workflow_dispatch" => workflow_dispatch(event, base, &mut out)?,
      "repository" => {
        let dims = base.with("action", action.as_str());
        out.count("repository", TOTAL, dims.clone())?;
        if action != TOTAL {
          out.count("repository", &action, dims)?;
        }
      }
      other => out.count_if_registered(&token(other), &action, base.with("action", action.as_str())),
    }
    Ok(out.finish())
  }
}

// ---------------------------------------------------------------------------
// push
// ---------------------------------------------------------------------------

fn push(event: &Event, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let branch = dimensions::branch(event);
  let author = dimensions::author(event);
  let with_branch = base.clone().with("branch", branch.as_str());

  out.count("push", "total", with_branch.clone().with("author", author.as_str()))?;
  out.count("push", "branch_activity", with_branch.clone())?;
  out.emit(
    "push",
    "commits",
    None,
    dimensions::commit_count(event) as f64,
    with_branch.clone(),
  )?;
  out.count("push", "by_author", base.clone().with("author", author.as_str()))?;

  let commits = payload::array(data, &["commits"]);
  if !commits.is_empty() {
    commit_metrics(commits, &base, &with_branch, out)?;
  }
  file_metrics(event, &base, &with_branch, out)?;

  if let Some(volume) = dimensions::code_volume(event) {
    out.emit("push", "code_additions", None, volume.additions as f64, with_branch.clone())?;
    out.emit("push", "code_deletions", None, volume.deletions as f64, with_branch.clone())?;
    out.emit("push", "code_churn", None, volume.churn() as f64, with_branch)?;
  }
  Ok(())
}

/// Per-commit type/breaking metrics, unique authors, and daily volume keyed by
/// each commit's own date (deliveries may batch or backfill several days).
fn commit_metrics(
  commits: &[Value],
  base: &Dimensions,
  with_branch: &Dimensions,
  out: &mut Emitter<'_>,
) -> Result<(), EngineError> {
  let mut authors = BTreeSet::new();
  let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();

  for c in commits {
    let author = dimensions::commit_author(c);
    authors.insert(author.clone());

    let message = payload::string(c, &["message"]).unwrap_or_default();
    let parts = commit::parse(&message);
    if let Some(commit_type) = &parts.commit_type {
      let dims = with_branch
        .clone()
        .with("type", commit_type.as_str())
        .with("scope", parts.scope.as_deref().unwrap_or(NONE))
        .with("conventional", parts.conventional)
        .with("author", author.as_str());
      out.count("push", "commit_type", dims.clone())?;
      if parts.breaking {
        out.count("push", "breaking_change", dims)?;
      }
    }

    let date = time::local_date_logged(payload::dig(c, &["timestamp"]), "commits[].timestamp");
    if let Some(date) = date {
      *by_date.entry(date).or_insert(0) += 1;
    }
  }

  out.emit(
    "push",
    "unique_authors",
    None,
    authors.len() as f64,
    with_branch.clone(),
  )?;

  let delivery_date = Utc::now().date_naive();
  for (date, count) in by_date {
    let dims = base
      .clone()
      .with("branch", with_branch.text("branch").unwrap_or(UNKNOWN))
      .with("date", date)
      .with("commit_date", date)
      .with("delivery_date", delivery_date);
    out.emit_at("commit_volume", "daily", count as f64, dims, time::midnight(date))?;
  }
  Ok(())
}

fn file_metrics(
  event: &Event,
  base: &Dimensions,
  with_branch: &Dimensions,
  out: &mut Emitter<'_>,
) -> Result<(), EngineError> {
  let changes = dimensions::file_changes(event);
  if changes.is_empty() {
    return Ok(());
  }
  out.emit("push", "files_added", None, changes.added.len() as f64, with_branch.clone())?;
  out.emit("push", "files_modified", None, changes.modified.len() as f64, with_branch.clone())?;
  out.emit("push", "files_removed", None, changes.removed.len() as f64, with_branch.clone())?;

  let summary = paths::analyze(changes.all());
  for (dir, count) in &summary.directory_counts {
    out.emit(
      "push",
      "directory_changes",
      None,
      *count as f64,
      base.clone().with("directory", dir.as_str()),
    )?;
  }
  if let Some(dir) = &summary.top_directory {
    out.emit(
      "push",
      "directory_hotspot",
      None,
      summary.top_directory_count as f64,
      base.clone().with("directory", dir.as_str()),
    )?;
  }
  for (ext, count) in &summary.extension_counts {
    out.emit(
      "push",
      "filetype_changes",
      None,
      *count as f64,
      base.clone().with("extension", ext.as_str()),
    )?;
  }
  if let Some(ext) = &summary.top_extension {
    out.emit(
      "push",
      "filetype_hotspot",
      None,
      summary.top_extension_count as f64,
      base.clone().with("extension", ext.as_str()),
    )?;
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// pull_request / issues
// ---------------------------------------------------------------------------

/// `<entity>.total`, `<entity>.<action>` and `<entity>.by_author`.
fn activity(entity: &str, action: &str, author: &str, dims: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let with_action = dims.clone().with("action", action).with("author", author);
  out.count(entity, TOTAL, with_action.clone())?;
  if action != TOTAL {
    out.count(entity, action, with_action)?;
  }
  out.count(entity, "by_author", dims.with("author", author))
}

fn pull_request(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let pr = payload::dig(data, &["pull_request"]).unwrap_or(&Value::Null);
  let author = payload::first_string(data, &[&["pull_request", "user", "login"], &["sender", "login"]])
    .unwrap_or_else(|| UNKNOWN.to_string());
  let mut dims = base;
  dims.insert(
    "base_branch",
    payload::string(pr, &["base", "ref"]).unwrap_or_else(|| UNKNOWN.to_string()),
  );
  if let Some(draft) = payload::boolean(pr, &["draft"]) {
    dims.insert("draft", draft);
  }

  activity("pull_request", action, &author, dims.clone(), out)?;

  let merged = payload::boolean(pr, &["merged"]).unwrap_or(false);
  if action == "closed" && merged {
    let merged_dims = dims.with("author", author.as_str());
    out.count("pull_request", "merged", merged_dims.clone())?;
    if let Some(secs) = time::duration_seconds(
      payload::dig(pr, &["created_at"]),
      payload::dig(pr, &["merged_at"]),
      "pull_request.created_at",
      "pull_request.merged_at",
    ) {
      out.emit("pull_request", "time_to_merge", None, secs, merged_dims)?;
    }
  }
  Ok(())
}

fn issues(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let issue = payload::dig(data, &["issue"]).unwrap_or(&Value::Null);
  let author = payload::first_string(data, &[&["issue", "user", "login"], &["sender", "login"]])
    .unwrap_or_else(|| UNKNOWN.to_string());
  let dims = base.with(
    "state",
    payload::string(issue, &["state"]).unwrap_or_else(|| UNKNOWN.to_string()),
  );

  activity("issues", action, &author, dims.clone(), out)?;

  if action == "closed" {
    if let Some(secs) = time::duration_seconds(
      payload::dig(issue, &["created_at"]),
      payload::dig(issue, &["closed_at"]),
      "issue.created_at",
      "issue.closed_at",
    ) {
      out.emit("issues", "resolution_time", None, secs, dims.with("author", author.as_str()))?;
    }
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// check_run / check_suite
// ---------------------------------------------------------------------------

fn check(event: &Event, entity: &str, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let subject = payload::dig(&event.data, &[entity]).unwrap_or(&Value::Null);
  let conclusion = payload::string(subject, &["conclusion"]).map(|c| token(&c));
  let dims = base
    .with("action", action)
    .with(
      "name",
      payload::first_string(subject, &[&["name"], &["app", "name"]]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "status",
      payload::string(subject, &["status"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with("conclusion", conclusion.as_deref().unwrap_or(UNKNOWN));

  out.count(entity, TOTAL, dims.clone())?;
  if action != TOTAL {
    out.count(entity, action, dims.clone())?;
  }
  if action == "completed" {
    if let Some(c) = &conclusion {
      out.emit(entity, "conclusion", Some(c), 1.0, dims.clone())?;
    }
    if let Some(secs) = time::duration_seconds(
      payload::dig(subject, &["started_at"]),
      payload::dig(subject, &["completed_at"]),
      "started_at",
      "completed_at",
    ) {
      out.emit(entity, "duration", None, secs, dims)?;
    }
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// create / delete
// ---------------------------------------------------------------------------

fn reference(event: &Event, entity: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let ref_type = payload::string(data, &["ref_type"])
    .map(|r| token(&r))
    .unwrap_or_else(|| UNKNOWN.to_string());
  let mut dims = base.with("ref_type", ref_type.as_str());
  if ref_type == "branch" {
    dims.insert(
      "branch",
      payload::string(data, &["ref"])
        .map(|r| dimensions::branch_from_ref(&r))
        .unwrap_or_else(|| UNKNOWN.to_string()),
    );
  }
  out.count(entity, TOTAL, dims.clone())?;
  out.count(entity, &ref_type, dims)
}

// ---------------------------------------------------------------------------
// deployments
// ---------------------------------------------------------------------------

fn deployment(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let deployment = payload::dig(&event.data, &["deployment"]).unwrap_or(&Value::Null);
  let dims = base
    .with("action", action)
    .with(
      "environment",
      payload::string(deployment, &["environment"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "task",
      payload::string(deployment, &["task"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "ref",
      payload::string(deployment, &["ref"]).unwrap_or_else(|| UNKNOWN.to_string()),
    );
  out.count("deployment", TOTAL, dims.clone())?;
  if action != TOTAL {
    out.count("deployment", action, dims)?;
  }
  Ok(())
}

fn deployment_status(event: &Event, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let environment = payload::first_string(
    data,
    &[&["deployment_status", "environment"], &["deployment", "environment"]],
  )
  .unwrap_or_else(|| UNKNOWN.to_string());
  let state = payload::string(data, &["deployment_status", "state"])
    .map(|s| token(&s))
    .unwrap_or_else(|| UNKNOWN.to_string());
  let dims = base
    .with("environment", environment.as_str())
    .with("state", state.as_str());

  out.count("deployment_status", TOTAL, dims.clone())?;
  out.count("deployment_status", &state, dims.clone())?;

  match state.as_str() {
    "success" => {
      out.emit("ci", "deploy", Some("completed"), 1.0, dims.clone())?;
      let updated = payload::dig(data, &["deployment_status", "updated_at"])
        .or_else(|| payload::dig(data, &["deployment_status", "created_at"]));
      let lead_time = time::duration_seconds(
        payload::dig(data, &["deployment", "created_at"]),
        updated,
        "deployment.created_at",
        "deployment_status.updated_at",
      );
      if let Some(secs) = lead_time {
        out.emit("ci", "lead_time", None, secs, dims)?;
      }
    }
    "failure" | "error" => {
      out.emit("ci", "deploy", Some("failed"), 1.0, dims.with("reason", state.as_str()))?;
    }
    _ => {}
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

fn workflow_run(event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let data = &event.data;
  let run = payload::dig(data, &["workflow_run"]).unwrap_or(&Value::Null);
  let conclusion = payload::string(run, &["conclusion"])
    .map(|c| token(&c))
    .unwrap_or_else(|| UNKNOWN.to_string());
  let mut dims = base
    .with(
      "workflow_name",
      payload::first_string(data, &[&["workflow_run", "name"], &["workflow", "name"]])
        .unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "branch",
      payload::string(run, &["head_branch"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with(
      "trigger",
      payload::string(run, &["event"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with("conclusion", conclusion.as_str());
  if let Some(attempt) = payload::int(run, &["run_attempt"]) {
    dims.insert("run_attempt", attempt);
  }

  out.count("workflow_run", action, dims.clone())?;
  if action != "completed" {
    return Ok(());
  }

  out.emit("workflow_run", "conclusion", Some(&conclusion), 1.0, dims.clone())?;
  let build_status = ci::map_status(&conclusion);
  out.emit("ci", "build", Some(TOTAL), 1.0, dims.clone())?;
  out.emit("ci", "build", Some(&build_status), 1.0, dims.clone())?;

  let started = payload::dig(run, &["run_started_at"]).or_else(|| payload::dig(run, &["created_at"]));
  if let Some(secs) = time::duration_seconds(
    started,
    payload::dig(run, &["updated_at"]),
    "workflow_run.run_started_at",
    "workflow_run.updated_at",
  ) {
    out.emit("ci", "build", Some("duration"), secs, dims)?;
  }
  Ok(())
}

impl GithubEventClassifier {
  fn workflow_job(&self, event: &Event, action: &str, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
    let data = &event.data;
    let job = payload::dig(data, &["workflow_job"]).unwrap_or(&Value::Null);
    let job_name = payload::string(job, &["name"]).unwrap_or_else(|| UNKNOWN.to_string());
    let raw_conclusion = payload::string(job, &["conclusion"]).unwrap_or_else(|| UNKNOWN.to_string());
    let conclusion = token(&raw_conclusion);
    let mut dims = base
      .with("job_name", job_name.as_str())
      .with(
        "workflow_name",
        payload::string(job, &["workflow_name"]).unwrap_or_else(|| UNKNOWN.to_string()),
      )
      .with(
        "branch",
        payload::string(job, &["head_branch"]).unwrap_or_else(|| UNKNOWN.to_string()),
      )
      .with(
        "runner",
        payload::first_string(job, &[&["runner_name"], &["runner_group_name"]])
          .unwrap_or_else(|| UNKNOWN.to_string()),
      )
      .with("conclusion", conclusion.as_str());
    if let Some(attempt) = payload::int(job, &["run_attempt"]) {
      dims.insert("run_attempt", attempt);
    }

    out.count("workflow_job", action, dims.clone())?;
    if action != "completed" {
      return Ok(());
    }

    out.emit("workflow_job", "conclusion", Some(&conclusion), 1.0, dims.clone())?;
    let duration = time::duration_seconds(
      payload::dig(job, &["started_at"]),
      payload::dig(job, &["completed_at"]),
      "workflow_job.started_at",
      "workflow_job.completed_at",
    );
    if let Some(secs) = duration {
      out.emit("workflow_job", "duration", None, secs, dims.clone())?;
    }

    let success = conclusion == "success";
    let lower = job_name.to_lowercase();

    if lower.contains(&self.config.test_job_keyword.to_lowercase()) {
      if let Some(secs) = duration {
        out.emit("ci", "test", Some("duration"), secs, dims.clone())?;
      }
      let value = if success { 1.0 } else { 0.0 };
      out.emit("ci", "test", Some("success"), value, dims.clone())?;
    }

    if lower.contains(&self.config.deploy_job_keyword.to_lowercase()) {
      if let Some(secs) = duration {
        out.emit("ci", "deploy", Some("duration"), secs, dims.clone())?;
      }
      let outcome = if success { "completed" } else { "failed" };
      out.emit("ci", "deploy", Some(outcome), 1.0, dims.clone())?;
      out.dora_deployment("attempt", dims.clone())?;
      if !success {
        out.dora_deployment("failure", dims.clone().with("reason", raw_conclusion.as_str()))?;
      }
    }

    self.workflow_steps(job, &dims, out)?;
    Ok(())
  }

  /// `workflow_step.<type>.duration` and `.success` / `.failure` for each timed
  /// step whose name maps to a step type.
  fn workflow_steps(&self, job: &Value, job_dims: &Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
    for step in payload::array(job, &["steps"]) {
      let name = payload::string(step, &["name"]).unwrap_or_default();
      let lower = name.to_lowercase();
      if self.config.skipped_step_keywords.iter().any(|k| lower.contains(k.as_str())) {
        continue;
      }
      let Some(step_type) = self.config.step_types.iter().find(|t| lower.contains(t.as_str())) else {
        continue;
      };
      let Some(secs) = time::duration_seconds(
        payload::dig(step, &["started_at"]),
        payload::dig(step, &["completed_at"]),
        "step.started_at",
        "step.completed_at",
      ) else {
        debug!(step = %name, "step without timings skipped");
        continue;
      };
      let conclusion = payload::string(step, &["conclusion"]).unwrap_or_else(|| UNKNOWN.to_string());
      let dims = job_dims
        .clone()
        .with("step_name", name.as_str())
        .with("conclusion", conclusion.as_str());
      out.emit("workflow_step", step_type, Some("duration"), secs, dims.clone())?;
      let outcome = if conclusion == "success" { "success" } else { "failure" };
      out.emit("workflow_step", step_type, Some(outcome), 1.0, dims)?;
    }
    Ok(())
  }
}

fn workflow_dispatch(event: &Event, base: Dimensions, out: &mut Emitter<'_>) -> Result<(), EngineError> {
  let dims = base
    .with(
      "workflow",
      payload::string(&event.data, &["workflow"]).unwrap_or_else(|| UNKNOWN.to_string()),
    )
    .with("branch", dimensions::branch(event));
  out.count("workflow_dispatch", TOTAL, dims)
}
