//! Structured error types for the metrics engine.
//!
//! Payload problems (missing fields, bad timestamps inside `data`) are never
//! errors; they degrade to defaults. Only envelope validation, configuration
//! and metric-name contract violations surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("invalid metric name {name:?}: {reason}")]
  InvalidMetricName { name: String, reason: String },

  #[error("config: {0}")]
  Config(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidMetricName {
      name: name.into(),
      reason: reason.into(),
    }
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }
}
