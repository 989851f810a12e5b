//! Engine configuration with sane defaults.

use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;
use crate::naming::{is_token, Vocabulary};

/// Tunables for classification. Every field has a default, so a partial JSON
/// document is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Extra sources/entities/actions/details merged into the built-in vocabulary.
  pub vocabulary_extensions: Vocabulary,
  /// Workflow steps whose name contains one of these are ignored.
  pub skipped_step_keywords: Vec<String>,
  /// Step categories, matched in order against the lowercased step name.
  pub step_types: Vec<String>,
  /// Job-name keyword that marks a test job.
  pub test_job_keyword: String,
  /// Job-name keyword that marks a deploy job.
  pub deploy_job_keyword: String,
  /// Use the minimal built-in Jira classifier when none is configured.
  pub builtin_jira_fallback: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      vocabulary_extensions: Vocabulary::empty(),
      skipped_step_keywords: ["setup", "post", "initialize", "complete"]
        .into_iter()
        .map(String::from)
        .collect(),
      step_types: ["test", "build", "deploy", "check", "install", "publish"]
        .into_iter()
        .map(String::from)
        .collect(),
      test_job_keyword: "test".into(),
      deploy_job_keyword: "deploy".into(),
      builtin_jira_fallback: true,
    }
  }
}

impl Config {
  pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
    let config: Self = serde_json::from_str(s)?;
    config.normalized()
  }

  pub fn from_path(path: &Path) -> Result<Self, EngineError> {
    let raw = std::fs::read_to_string(path)
      .map_err(|e| EngineError::config(format!("{}: {}", path.display(), e)))?;
    Self::from_json_str(&raw)
  }

  /// Lowercase every keyword and step type. Step types become metric name
  /// segments, so they must be `[a-z0-9_]+`; blank keywords would match
  /// every name.
  pub fn normalized(mut self) -> Result<Self, EngineError> {
    for keyword in self
      .skipped_step_keywords
      .iter_mut()
      .chain([&mut self.test_job_keyword, &mut self.deploy_job_keyword])
    {
      *keyword = keyword.trim().to_lowercase();
      if keyword.is_empty() {
        return Err(EngineError::config("blank job or step keyword"));
      }
    }
    for step_type in &mut self.step_types {
      *step_type = step_type.trim().to_lowercase();
      if !is_token(step_type) {
        return Err(EngineError::config(format!(
          "step type {:?} must match [a-z0-9_]+",
          step_type
        )));
      }
    }
    Ok(self)
  }

  /// Built-in vocabulary plus extensions and any configured step types.
  pub fn vocabulary(&self) -> Vocabulary {
    let mut vocab = Vocabulary::builtin();
    vocab.merge(&self.vocabulary_extensions);
    let step_types: Vec<&str> = self.step_types.iter().map(String::as_str).collect();
    vocab.register("github", "workflow_step", &step_types, &[]);
    vocab
  }
}
