//! Dispatcher: routes each event to the classifier for its source prefix.

use std::sync::Arc;

use tracing::debug;

use crate::classifiers::{
  BitbucketEventClassifier, CiEventClassifier, GithubEventClassifier, JiraEventClassifier,
  JiraFallbackClassifier, NullClassifier, Source, SourceClassifier,
};
use crate::config::Config;
use crate::error::EngineError;
use crate::naming::MetricNamingRules;
use crate::normalize;
use crate::types::{ClassificationResult, ClassifiedOutput, Event, InboundEvent};

/// The metrics classification engine. Holds no per-event state; clones share
/// the same classifiers and can be used from any number of threads.
#[derive(Clone)]
pub struct MetricClassifier {
  rules: Arc<MetricNamingRules>,
  routes: Vec<(Source, Arc<dyn SourceClassifier>)>,
  generic: Arc<dyn SourceClassifier>,
}

impl MetricClassifier {
  /// Every built-in classifier wired up. GitLab and task events have no
  /// classifier and produce no metrics.
  pub fn new(config: Config) -> Self {
    let config = Arc::new(config);
    let rules = Arc::new(MetricNamingRules::new(config.vocabulary()));
    Self::empty_with_rules(&config, rules.clone())
      .with(
        Source::Github,
        Arc::new(GithubEventClassifier::new(rules.clone(), config.clone())),
      )
      .with(Source::Jira, Arc::new(JiraEventClassifier::new(rules.clone())))
      .with(Source::Bitbucket, Arc::new(BitbucketEventClassifier::new(rules.clone())))
      .with(Source::Ci, Arc::new(CiEventClassifier::new(rules)))
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  /// No source classifiers configured. Jira still gets the minimal built-in
  /// classifier unless `builtin_jira_fallback` is off.
  pub fn empty(config: Config) -> Self {
    let rules = Arc::new(MetricNamingRules::new(config.vocabulary()));
    Self::empty_with_rules(&config, rules)
  }

  fn empty_with_rules(config: &Config, rules: Arc<MetricNamingRules>) -> Self {
    let routes = Source::ALL
      .into_iter()
      .map(|source| {
        let classifier: Arc<dyn SourceClassifier> = match source {
          Source::Jira if config.builtin_jira_fallback => Arc::new(JiraFallbackClassifier::new(rules.clone())),
          _ => Arc::new(NullClassifier),
        };
        (source, classifier)
      })
      .collect();
    Self {
      rules,
      routes,
      generic: Arc::new(NullClassifier),
    }
  }

  /// Replace the classifier for one source.
  pub fn with(mut self, source: Source, classifier: Arc<dyn SourceClassifier>) -> Self {
    match self.routes.iter_mut().find(|(s, _)| *s == source) {
      Some(route) => route.1 = classifier,
      None => self.routes.push((source, classifier)),
    }
    self
  }

  /// Naming rules the built-in classifiers validate against.
  pub fn rules(&self) -> &MetricNamingRules {
    &self.rules
  }

  /// Classify a normalized event.
  pub fn classify_event(&self, event: &Event) -> Result<ClassificationResult, EngineError> {
    let source = Source::from_event_name(&event.name);
    let classifier = source
      .and_then(|s| self.routes.iter().find(|(r, _)| *r == s))
      .map(|(_, c)| c)
      .unwrap_or(&self.generic);
    let metrics = classifier.classify(event)?;
    debug!(
      event = %event.name,
      source = %source.map(|s| s.to_string()).unwrap_or_else(|| "generic".into()),
      metrics = metrics.len(),
      "classified"
    );
    Ok(ClassificationResult::new(metrics))
  }

  /// Validate an inbound envelope, then classify it.
  pub fn process(&self, raw: &InboundEvent) -> Result<ClassifiedOutput, EngineError> {
    let event = normalize::normalize(raw)?;
    let result = self.classify_event(&event)?;
    Ok(ClassifiedOutput {
      event_id: event.id,
      event: event.name,
      metrics: result.metrics,
    })
  }
}

impl Default for MetricClassifier {
  fn default() -> Self {
    Self::with_defaults()
  }
}
