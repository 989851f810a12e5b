//! Integration tests for the metrics engine.

use metrics_engine::classifiers::{BitbucketEventClassifier, NullClassifier};
use metrics_engine::naming::normalize_dimension_value;
use metrics_engine::types::DimensionValue;
use metrics_engine::{ClassificationResult, Config, InboundEvent, MetricClassifier, Source};
use std::sync::Arc;

fn inbound(json: &str) -> InboundEvent {
  serde_json::from_str(json).unwrap()
}

fn classify(json: &str) -> ClassificationResult {
  let engine = MetricClassifier::with_defaults();
  let out = engine.process(&inbound(json)).unwrap();
  ClassificationResult::new(out.metrics)
}

fn breaking_push() -> &'static str {
  r#"{
    "id": "delivery-1",
    "name": "github.push",
    "source": "github",
    "timestamp": "2025-01-15T10:30:00Z",
    "data": {
      "ref": "refs/heads/main",
      "repository": {"full_name": "acme/api"},
      "head_commit": {"author": {"name": "Ana"}, "message": "feat(api)!: breaking change"},
      "commits": [{
        "id": "abc123",
        "message": "feat(api)!: breaking change",
        "timestamp": "2025-01-15T10:00:00Z",
        "author": {"name": "Ana"},
        "added": ["src/api.rb"],
        "modified": [],
        "removed": [],
        "stats": {"additions": 10, "deletions": 2}
      }]
    }
  }"#
}

#[test]
fn breaking_feature_push_produces_full_metric_set() {
  let r = classify(breaking_push());

  let value = |name: &str| r.first(name).map(|m| m.value);
  assert_eq!(value("github.push.total"), Some(1.0));
  assert_eq!(value("github.push.commits"), Some(1.0));
  assert_eq!(value("github.push.files_added"), Some(1.0));
  assert_eq!(value("github.push.code_additions"), Some(10.0));
  assert_eq!(value("github.push.code_deletions"), Some(2.0));
  assert_eq!(value("github.push.code_churn"), Some(12.0));
  assert!(r.first("github.push.breaking_change").is_some());

  let typed = r.first("github.push.commit_type").unwrap();
  assert_eq!(typed.dimensions.text("type"), Some("feat"));
  assert_eq!(typed.dimensions.text("scope"), Some("api"));
  assert_eq!(typed.dimensions.text("conventional"), Some("true"));

  // Every metric carries the canonical repository dimensions.
  for m in &r.metrics {
    assert_eq!(m.dimensions.text("repository"), Some("acme/api"), "{}", m.full_name());
  }
  let hotspot = r.first("github.push.directory_hotspot").unwrap();
  assert_eq!(hotspot.dimensions.text("directory"), Some("src"));
}

#[test]
fn failed_production_deploy_job_counts_dora_failure() {
  let r = classify(
    r#"{
      "name": "github.workflow_job.completed",
      "source": "github",
      "data": {
        "repository": {"full_name": "acme/api"},
        "workflow_job": {
          "name": "Deploy to Production",
          "conclusion": "failure",
          "started_at": "2025-01-15T10:00:00Z",
          "completed_at": "2025-01-15T10:04:00Z",
          "steps": []
        }
      }
    }"#,
  );
  assert!(r.first("github.ci.deploy.failed").is_some());
  let failure = r.first("dora.deployment.failure").unwrap();
  assert_eq!(failure.dimensions.text("reason"), Some("failure"));
  assert!(r.first("dora.deployment.attempt").is_some());
}

#[test]
fn unconfigured_source_yields_no_metrics() {
  let engine = MetricClassifier::with_defaults();
  let out = engine
    .process(&inbound(r#"{"name": "gitlab.custom_thing", "source": "gitlab", "data": {"x": 1}}"#))
    .unwrap();
  assert!(out.metrics.is_empty());
  assert_eq!(out.event, "gitlab.custom_thing");
}

#[test]
fn repository_values_gain_owner_placeholder() {
  assert_eq!(
    normalize_dimension_value("repository", DimensionValue::from("my-repo")),
    DimensionValue::from("unknown/my-repo")
  );
  assert_eq!(
    normalize_dimension_value("repository", DimensionValue::from("org/my-repo")),
    DimensionValue::from("org/my-repo")
  );
}

#[test]
fn classification_is_deterministic() {
  // Strip the wall-clock delivery_date so runs on either side of midnight match.
  let render = || {
    let r = classify(breaking_push());
    r.metrics
      .iter()
      .map(|m| {
        let dims: Vec<String> = m
          .dimensions
          .iter()
          .filter(|(k, _)| k.as_str() != "delivery_date")
          .map(|(k, v)| format!("{}={:?}", k, v))
          .collect();
        format!("{} {} {}", m.full_name(), m.value, dims.join(","))
      })
      .collect::<Vec<_>>()
  };
  assert_eq!(render(), render());
}

#[test]
fn metrics_serialize_as_dotted_names() {
  let engine = MetricClassifier::with_defaults();
  let out = engine
    .process(&inbound(r#"{"name": "ci.build", "source": "jenkins", "data": {"status": "failed"}}"#))
    .unwrap();
  let json = serde_json::to_value(&out).unwrap();
  assert_eq!(json["event"], "ci.build");
  assert_eq!(json["metrics"][0]["name"], "ci.build.total");
  assert_eq!(json["metrics"][1]["name"], "ci.build.failed");
  assert_eq!(json["metrics"][0]["dimensions"]["source"], "jenkins");
}

#[test]
fn jira_issue_flows_through_dispatcher() {
  let r = classify(
    r#"{
      "name": "jira.issue_created",
      "source": "jira",
      "data": {"issue": {"fields": {"project": {"key": "OPS"}, "issuetype": {"name": "Bug"}}}}
    }"#,
  );
  let created = r.first("jira.issue.created").unwrap();
  assert_eq!(created.dimensions.text("project"), Some("OPS"));
  assert_eq!(created.dimensions.text("issue_type"), Some("Bug"));
}

#[test]
fn sources_can_be_switched_off() {
  let engine = MetricClassifier::new(Config::default())
    .with(Source::Bitbucket, Arc::new(NullClassifier))
    .with(Source::Github, Arc::new(NullClassifier));
  let out = engine.process(&inbound(breaking_push())).unwrap();
  assert!(out.metrics.is_empty());

  let engine = MetricClassifier::empty(Config::default())
    .with(Source::Bitbucket, Arc::new(BitbucketEventClassifier::default()));
  let out = engine
    .process(&inbound(r#"{"name": "bitbucket.repo:push", "source": "bitbucket", "data": {}}"#))
    .unwrap();
  assert_eq!(out.metrics[0].full_name(), "bitbucket.push.total");
}

#[test]
fn invalid_envelope_is_rejected() {
  let engine = MetricClassifier::with_defaults();
  let err = engine
    .process(&inbound(r#"{"name": "github.push", "source": "github", "timestamp": "yesterday"}"#))
    .unwrap_err();
  assert!(err.to_string().contains("timestamp"));
}

#[test]
fn config_file_extends_vocabulary() {
  let config = Config::from_json_str(
    r#"{
      "vocabulary_extensions": {"dora": {"incident": {"actions": ["opened"]}}},
      "deploy_job_keyword": "Release"
    }"#,
  )
  .unwrap();
  assert!(!MetricClassifier::with_defaults().rules().is_valid("dora.incident.opened"));
  let engine = MetricClassifier::new(config);
  assert!(engine.rules().is_valid("dora.incident.opened"));
  assert!(!engine.rules().is_valid("dora.incident.closed"));

  let r = engine
    .process(&inbound(
      r#"{"name": "github.workflow_job.completed", "source": "github",
          "data": {"workflow_job": {"name": "Release", "conclusion": "success"}}}"#,
    ))
    .unwrap();
  let names: Vec<String> = r.metrics.iter().map(|m| m.full_name()).collect();
  assert!(names.contains(&"github.ci.deploy.completed".to_string()), "{:?}", names);
}
