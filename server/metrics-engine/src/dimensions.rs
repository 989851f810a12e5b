//! Canonical dimensions pulled out of raw webhook payloads.
//!
//! Nothing here fails: absent or null fields degrade to `unknown`, zero, or
//! an empty collection.

use serde_json::Value;

use crate::commit::{self, CommitParts};
use crate::naming::UNKNOWN;
use crate::paths::FileChanges;
use crate::payload;
use crate::types::{Dimensions, Event};

/// Summed line counts from commit `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeVolume {
  pub additions: u64,
  pub deletions: u64,
}

impl CodeVolume {
  pub fn churn(&self) -> u64 {
    self.additions.saturating_add(self.deletions)
  }
}

// ---------------------------------------------------------------------------
// Per-source base dimensions
// ---------------------------------------------------------------------------

/// `repository` and `organization` for GitHub payloads.
pub fn github_dimensions(event: &Event) -> Dimensions {
  let data = &event.data;
  let repository = payload::first_string(data, &[&["repository", "full_name"], &["repository", "name"]]);
  let organization = organization(
    repository.as_deref(),
    &[
      &["repository", "owner", "login"],
      &["repository", "owner", "name"],
      &["organization", "login"],
    ],
    data,
  );
  Dimensions::new()
    .with("repository", repository.unwrap_or_else(|| UNKNOWN.to_string()))
    .with("organization", organization)
}

/// `repository` and `organization` (workspace) for Bitbucket payloads.
pub fn bitbucket_dimensions(event: &Event) -> Dimensions {
  let data = &event.data;
  let repository = payload::first_string(data, &[&["repository", "full_name"], &["repository", "name"]]);
  let organization = organization(
    repository.as_deref(),
    &[&["repository", "workspace", "slug"], &["repository", "owner", "username"]],
    data,
  );
  Dimensions::new()
    .with("repository", repository.unwrap_or_else(|| UNKNOWN.to_string()))
    .with("organization", organization)
}

/// `project`, `issue_type`, `priority` and `status` for Jira payloads.
pub fn jira_dimensions(event: &Event) -> Dimensions {
  let data = &event.data;
  let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN.to_string());
  Dimensions::new()
    .with(
      "project",
      or_unknown(payload::first_string(
        data,
        &[
          &["issue", "fields", "project", "key"],
          &["project", "key"],
          &["sprint", "originBoardId"],
        ],
      )),
    )
    .with(
      "issue_type",
      or_unknown(payload::string(data, &["issue", "fields", "issuetype", "name"])),
    )
    .with(
      "priority",
      or_unknown(payload::string(data, &["issue", "fields", "priority", "name"])),
    )
    .with(
      "status",
      or_unknown(payload::string(data, &["issue", "fields", "status", "name"])),
    )
}

/// Organization from `owner/repo`, falling back to owner fields.
fn organization(repository: Option<&str>, fallbacks: &[&[&str]], data: &Value) -> String {
  if let Some((owner, _)) = repository.and_then(|r| r.split_once('/')) {
    if !owner.is_empty() {
      return owner.to_string();
    }
  }
  payload::first_string(data, fallbacks).unwrap_or_else(|| UNKNOWN.to_string())
}

// ---------------------------------------------------------------------------
// Targeted extractors
// ---------------------------------------------------------------------------

/// Push author: head-commit author name, then email, then pusher name, then
/// pusher email.
pub fn author(event: &Event) -> String {
  payload::first_string(
    &event.data,
    &[
      &["head_commit", "author", "name"],
      &["head_commit", "author", "email"],
      &["pusher", "name"],
      &["pusher", "email"],
    ],
  )
  .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Author of a single commit object.
pub fn commit_author(commit: &Value) -> String {
  payload::first_string(
    commit,
    &[
      &["author", "name"],
      &["author", "email"],
      &["author", "username"],
      &["author", "user", "display_name"],
      &["author", "raw"],
    ],
  )
  .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Branch from the payload `ref`.
pub fn branch(event: &Event) -> String {
  payload::string(&event.data, &["ref"])
    .map(|r| branch_from_ref(&r))
    .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `refs/heads/main` -> `main`, `refs/tags/v1` -> `tag:v1`, anything else as-is.
pub fn branch_from_ref(r: &str) -> String {
  if let Some(b) = r.strip_prefix("refs/heads/") {
    b.to_string()
  } else if let Some(t) = r.strip_prefix("refs/tags/") {
    format!("tag:{}", t)
  } else {
    r.to_string()
  }
}

/// Number of commits in a push: the `commits` array, else `size`.
pub fn commit_count(event: &Event) -> u64 {
  let commits = payload::array(&event.data, &["commits"]);
  if !commits.is_empty() {
    return commits.len() as u64;
  }
  payload::int(&event.data, &["size"])
    .and_then(|n| u64::try_from(n).ok())
    .unwrap_or(0)
}

/// Added/modified/removed paths across every commit in a push.
pub fn file_changes(event: &Event) -> FileChanges {
  let mut changes = FileChanges::default();
  for commit in payload::array(&event.data, &["commits"]) {
    for p in payload::strings(commit, &["added"]) {
      changes.push_added(&p);
    }
    for p in payload::strings(commit, &["modified"]) {
      changes.push_modified(&p);
    }
    for p in payload::strings(commit, &["removed"]) {
      changes.push_removed(&p);
    }
  }
  changes
}

/// Sum of `stats.additions` / `stats.deletions` across commits. `None` when no
/// commit carries stats.
pub fn code_volume(event: &Event) -> Option<CodeVolume> {
  let mut total: Option<CodeVolume> = None;
  let head = payload::dig(&event.data, &["head_commit"]);
  let commits = payload::array(&event.data, &["commits"]);
  let sources: Vec<&Value> = if commits.is_empty() {
    head.into_iter().collect()
  } else {
    commits.iter().collect()
  };
  for commit in sources {
    if payload::dig(commit, &["stats"]).is_none() {
      continue;
    }
    let adds = payload::int(commit, &["stats", "additions"]).unwrap_or(0).max(0) as u64;
    let dels = payload::int(commit, &["stats", "deletions"]).unwrap_or(0).max(0) as u64;
    let acc = total.get_or_insert_with(CodeVolume::default);
    acc.additions = acc.additions.saturating_add(adds);
    acc.deletions = acc.deletions.saturating_add(dels);
  }
  total
}

/// Conventional-commit parts of the head commit (or the first commit).
pub fn conventional_commit_parts(event: &Event) -> CommitParts {
  let message = payload::first_string(
    &event.data,
    &[&["head_commit", "message"], &["commits", "0", "message"]],
  )
  .unwrap_or_default();
  commit::parse(&message)
}
