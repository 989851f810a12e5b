//! Conventional-commit parsing with keyword inference for free-form messages.

use std::sync::LazyLock;

use regex::Regex;

static CONVENTIONAL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?s)^(?i:(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert))(\(([^)]*)\))?(!)?:\s*(.*)$")
    .expect("invalid regex")
});

/// Types a commit may carry, strict or inferred.
pub const COMMIT_TYPES: &[&str] = &[
  "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Fallback inference order: first matching keyword group wins.
const INFERENCE: &[(&str, &[&str])] = &[
  ("fix", &["fix", "bug", "patch", "hotfix", "resolve", "repair"]),
  ("feat", &["feat", "feature", "add", "implement", "introduce", "new"]),
  ("docs", &["doc", "readme", "documentation", "comment"]),
  ("test", &["test", "spec", "coverage"]),
  ("style", &["style", "format", "lint", "whitespace", "prettier"]),
  ("refactor", &["refactor", "restructure", "cleanup", "clean up", "rename", "simplify"]),
  ("perf", &["perf", "performance", "optimize", "optimise", "speed"]),
  ("build", &["build", "deps", "dependency", "dependencies", "bump", "upgrade"]),
  ("ci", &["ci", "pipeline", "workflow", "github action"]),
  ("revert", &["revert", "rollback", "roll back"]),
];

/// Words that start with an inference keyword but mean something else.
const EXCLUDED: &[&str] = &[
  "address", "newline", "newsletter", "fixture", "docker", "special", "specif", "circ", "ciph",
  "cit", "civ",
];

const DEFAULT_TYPE: &str = "chore";

/// Parts of a commit header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitParts {
  /// `None` only for blank messages.
  pub commit_type: Option<String>,
  pub scope: Option<String>,
  pub breaking: bool,
  pub description: String,
  /// Matched the strict grammar.
  pub conventional: bool,
  /// Type was inferred from keywords.
  pub inferred: bool,
}

/// Parse a commit message. Only the first line is matched against the
/// grammar; the body is still searched for `BREAKING CHANGE`.
pub fn parse(message: &str) -> CommitParts {
  let message = message.trim();
  if message.is_empty() {
    return CommitParts::default();
  }
  let header = message.lines().next().unwrap_or_default().trim();

  if let Some(caps) = CONVENTIONAL.captures(header) {
    let commit_type = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
    let scope = caps
      .get(3)
      .map(|m| m.as_str().to_string())
      .filter(|s| !s.is_empty());
    let description = caps.get(5).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    let breaking = caps.get(4).is_some() || message.contains("BREAKING CHANGE");
    return CommitParts {
      commit_type,
      scope,
      breaking,
      description,
      conventional: true,
      inferred: false,
    };
  }

  let lower = message.to_lowercase();
  CommitParts {
    commit_type: Some(infer_type(&lower).to_string()),
    scope: None,
    breaking: lower.contains("break") || lower.contains('!'),
    description: header.to_string(),
    conventional: false,
    inferred: true,
  }
}

fn infer_type(lower: &str) -> &'static str {
  let words: Vec<&str> = lower
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty() && !EXCLUDED.iter().any(|x| w.starts_with(x)))
    .collect();
  for (commit_type, keywords) in INFERENCE {
    let hit = keywords.iter().any(|k| {
      if k.contains(' ') {
        lower.contains(k)
      } else {
        words.iter().any(|w| w.starts_with(k))
      }
    });
    if hit {
      return commit_type;
    }
  }
  DEFAULT_TYPE
}
