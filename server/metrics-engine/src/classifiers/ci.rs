//! CI build/test/deploy/lead-time events, either from generic CI systems
//! (`ci.*`) or forwarded through GitHub (`github.ci.*`).

use std::sync::Arc;

use tracing::debug;

use super::SourceClassifier;
use crate::emit::Emitter;
use crate::error::EngineError;
use crate::naming::{self, MetricNamingRules, UNKNOWN};
use crate::payload;
use crate::time;
use crate::types::{Dimensions, Event, MetricDefinition};

/// Where CI metrics sit in the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
  /// `github.ci.build.failed`, `github.ci.lead_time`
  Nested,
  /// `ci.build.failed`, `ci.lead_time.seconds`
  Flat,
}

/// CI status mapped onto the metric vocabulary: success -> completed,
/// failure -> failed, anything else passes through.
pub(crate) fn map_status(status: &str) -> String {
  match status.to_ascii_lowercase().as_str() {
    "success" | "succeeded" | "successful" | "passed" => "completed".to_string(),
    "failure" | "failed" | "error" | "errored" => "failed".to_string(),
    other => naming::token(other),
  }
}

pub(crate) fn is_success(status: &str) -> bool {
  map_status(status) == "completed"
}

/// Handle one CI event of the given kind (`build`, `test`, `deploy`, `lead_time`).
pub(crate) fn classify(
  event: &Event,
  kind: Option<&str>,
  layout: Layout,
  base: Dimensions,
  out: &mut Emitter<'_>,
) -> Result<(), EngineError> {
  let data = &event.data;
  let mut dims = base;
  for (key, path) in [
    ("pipeline", &["pipeline"][..]),
    ("environment", &["environment"][..]),
    ("branch", &["branch"][..]),
    ("provider", &["provider"][..]),
  ] {
    if let Some(v) = payload::string(data, path) {
      dims.insert(key, v);
    }
  }

  match kind {
    Some(kind @ ("build" | "test" | "deploy")) => {
      let raw_status = payload::first_string(data, &[&["status"], &["conclusion"], &["state"]])
        .unwrap_or_else(|| UNKNOWN.to_string());
      let status = map_status(&raw_status);
      dims.insert("status", status.as_str());

      emit(out, layout, kind, "total", 1.0, dims.clone())?;
      emit(out, layout, kind, &status, 1.0, dims.clone())?;
      if let Some(secs) = payload::float(data, &["duration"]).filter(|s| *s >= 0.0) {
        emit(out, layout, kind, "duration", secs, dims.clone())?;
      }
      if kind == "deploy" {
        out.dora_deployment("attempt", dims.clone())?;
        if !is_success(&raw_status) {
          out.dora_deployment("failure", dims.with("reason", raw_status))?;
        }
      }
    }
    Some("lead_time") => {
      let seconds = payload::float(data, &["lead_time_seconds"]).or_else(|| {
        time::duration_seconds(
          payload::dig(data, &["commit_timestamp"]),
          payload::dig(data, &["deploy_timestamp"]),
          "commit_timestamp",
          "deploy_timestamp",
        )
      });
      match seconds {
        Some(s) => match layout {
          Layout::Nested => out.emit("ci", "lead_time", None, s, dims)?,
          Layout::Flat => out.emit("lead_time", "seconds", None, s, dims)?,
        },
        None => debug!(event = %event.name, "lead time unavailable"),
      }
    }
    other => debug!(event = %event.name, kind = ?other, "unsupported ci event"),
  }
  Ok(())
}

fn emit(
  out: &mut Emitter<'_>,
  layout: Layout,
  kind: &str,
  detail: &str,
  value: f64,
  dims: Dimensions,
) -> Result<(), EngineError> {
  match layout {
    Layout::Nested => out.emit("ci", kind, Some(detail), value, dims),
    Layout::Flat => out.emit(kind, detail, None, value, dims),
  }
}

/// Classifier for the `ci.` prefix.
pub struct CiEventClassifier {
  rules: Arc<MetricNamingRules>,
}

impl CiEventClassifier {
  pub fn new(rules: Arc<MetricNamingRules>) -> Self {
    Self { rules }
  }
}

impl Default for CiEventClassifier {
  fn default() -> Self {
    Self::new(Arc::new(MetricNamingRules::default()))
  }
}

impl SourceClassifier for CiEventClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    let mut out = Emitter::new(&self.rules, "ci");
    let base = Dimensions::new().with("source", event.source.as_str());
    classify(event, event.segment(1), Layout::Flat, base, &mut out)?;
    Ok(out.finish())
  }
}
