//! Per-source classifiers and the trait the dispatcher routes through.

mod bitbucket;
mod ci;
mod github;
mod jira;

use std::fmt;

use tracing::debug;

use crate::error::EngineError;
use crate::types::{Event, MetricDefinition};

pub use bitbucket::BitbucketEventClassifier;
pub use ci::CiEventClassifier;
pub use github::GithubEventClassifier;
pub use jira::{JiraEventClassifier, JiraFallbackClassifier};

/// Turns one event of a single source into metric definitions.
///
/// Implementations hold only read-only collaborators, so one instance can be
/// shared across threads. `Err` is reserved for metric-name contract
/// violations; payload problems never fail classification.
pub trait SourceClassifier: Send + Sync {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError>;
}

/// Event sources, in routing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
  Github,
  Jira,
  Gitlab,
  Bitbucket,
  Ci,
  Task,
}

impl Source {
  pub const ALL: [Source; 6] = [
    Source::Github,
    Source::Jira,
    Source::Gitlab,
    Source::Bitbucket,
    Source::Ci,
    Source::Task,
  ];

  pub fn prefix(self) -> &'static str {
    match self {
      Self::Github => "github.",
      Self::Jira => "jira.",
      Self::Gitlab => "gitlab.",
      Self::Bitbucket => "bitbucket.",
      Self::Ci => "ci.",
      Self::Task => "task.",
    }
  }

  /// First source whose prefix the event name starts with.
  pub fn from_event_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|s| name.starts_with(s.prefix()))
  }
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.prefix().trim_end_matches('.'))
  }
}

/// Stand-in for a source without a configured classifier, and the generic
/// fallback for unrecognized prefixes: classifies everything to no metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

impl SourceClassifier for NullClassifier {
  fn classify(&self, event: &Event) -> Result<Vec<MetricDefinition>, EngineError> {
    debug!(event = %event.name, "no classifier configured; emitting nothing");
    Ok(Vec::new())
  }
}

/// `(entity, action)` for names shaped `source.entity.action`, or
/// `source.entity:action` / `source.entity_action` for the listed entities.
pub(crate) fn split_route(event: &Event, compound_entities: &[&str]) -> (Option<String>, Option<String>) {
  let entity = event.segment(1);
  let action = event.segment(2);
  match (entity, action) {
    (Some(e), Some(a)) => (Some(e.to_string()), Some(a.to_string())),
    (Some(e), None) => {
      if let Some((ent, act)) = e.split_once(':') {
        return (Some(ent.to_string()), Some(act.to_string()).filter(|a| !a.is_empty()));
      }
      for known in compound_entities {
        if let Some(act) = e.strip_prefix(known).and_then(|rest| rest.strip_prefix('_')) {
          return (Some(known.to_string()), Some(act.to_string()).filter(|a| !a.is_empty()));
        }
      }
      (Some(e.to_string()), None)
    }
    (None, _) => (None, None),
  }
}
