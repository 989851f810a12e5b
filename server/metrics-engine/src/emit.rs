//! Accumulates metric definitions for one classification call, validating
//! every name against the naming rules as it is built.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::EngineError;
use crate::naming::{MetricName, MetricNamingRules};
use crate::types::{Dimensions, MetricDefinition};

pub struct Emitter<'a> {
  rules: &'a MetricNamingRules,
  source: &'static str,
  metrics: Vec<MetricDefinition>,
}

impl<'a> Emitter<'a> {
  pub fn new(rules: &'a MetricNamingRules, source: &'static str) -> Self {
    Self {
      rules,
      source,
      metrics: Vec::new(),
    }
  }

  /// `<source>.<entity>.<action>[.<detail>]` with an explicit value.
  pub fn emit(
    &mut self,
    entity: &str,
    action: &str,
    detail: Option<&str>,
    value: f64,
    dimensions: Dimensions,
  ) -> Result<(), EngineError> {
    let name = self.rules.build(self.source, entity, action, detail)?;
    self.push(name, value, dimensions, None);
    Ok(())
  }

  /// Counter with value 1.
  pub fn count(&mut self, entity: &str, action: &str, dimensions: Dimensions) -> Result<(), EngineError> {
    self.emit(entity, action, None, 1.0, dimensions)
  }

  /// Metric carrying its own timestamp instead of the event time.
  pub fn emit_at(
    &mut self,
    entity: &str,
    action: &str,
    value: f64,
    dimensions: Dimensions,
    timestamp: DateTime<Utc>,
  ) -> Result<(), EngineError> {
    let name = self.rules.build(self.source, entity, action, None)?;
    self.push(name, value, dimensions, Some(timestamp));
    Ok(())
  }

  /// `dora.deployment.<action>` counter.
  pub fn dora_deployment(&mut self, action: &str, dimensions: Dimensions) -> Result<(), EngineError> {
    let name = self.rules.build("dora", "deployment", action, None)?;
    self.push(name, 1.0, dimensions, None);
    Ok(())
  }

  /// Counter whose entity/action come straight from the event name, so a
  /// `*` entity in the vocabulary covers it. Names the vocabulary does not
  /// cover are dropped rather than failing the event.
  pub fn count_if_registered(&mut self, entity: &str, action: &str, dimensions: Dimensions) {
    match self.rules.build_generic(self.source, entity, action) {
      Ok(name) => self.push(name, 1.0, dimensions, None),
      Err(e) => debug!(error = %e, "generic metric skipped"),
    }
  }

  pub fn len(&self) -> usize {
    self.metrics.len()
  }

  pub fn is_empty(&self) -> bool {
    self.metrics.is_empty()
  }

  pub fn finish(self) -> Vec<MetricDefinition> {
    self.metrics
  }

  fn push(&mut self, name: MetricName, value: f64, dimensions: Dimensions, timestamp: Option<DateTime<Utc>>) {
    self.metrics.push(MetricDefinition {
      name,
      value,
      dimensions,
      timestamp,
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn emits_validated_names() {
    let rules = MetricNamingRules::default();
    let mut out = Emitter::new(&rules, "github");
    out.count("push", "total", Dimensions::new()).unwrap();
    out.emit("workflow_run", "conclusion", Some("success"), 1.0, Dimensions::new()).unwrap();
    out.dora_deployment("attempt", Dimensions::new()).unwrap();
    let names: Vec<String> = out.finish().iter().map(|m| m.full_name()).collect();
    assert_eq!(
      names,
      vec!["github.push.total", "github.workflow_run.conclusion.success", "dora.deployment.attempt"]
    );
  }

  #[test]
  fn unregistered_name_fails_loudly() {
    let rules = MetricNamingRules::default();
    let mut out = Emitter::new(&rules, "github");
    let err = out.count("push", "mystery", Dimensions::new()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidMetricName { .. }));
    let err = out.count("pull_requst", "opened", Dimensions::new()).unwrap_err();
    assert!(err.to_string().contains("pull_requst"));
    assert!(out.is_empty());
  }

  #[test]
  fn generic_counter_is_dropped_when_unregistered() {
    let rules = MetricNamingRules::default();
    let mut out = Emitter::new(&rules, "github");
    out.count_if_registered("commit_volume", "weekly", Dimensions::new());
    out.count_if_registered("star", "created", Dimensions::new());
    assert_eq!(out.len(), 1);
  }
}
