//! Directory and file-type hotspots over a batch of touched paths.

use indexmap::IndexMap;

use crate::naming::{NONE, ROOT};

/// Files touched by a batch of commits, split by change kind. Paths are
/// normalized and de-duplicated within each kind, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
  pub added: Vec<String>,
  pub modified: Vec<String>,
  pub removed: Vec<String>,
}

impl FileChanges {
  pub fn push_added(&mut self, path: &str) {
    push_unique(&mut self.added, path);
  }

  pub fn push_modified(&mut self, path: &str) {
    push_unique(&mut self.modified, path);
  }

  pub fn push_removed(&mut self, path: &str) {
    push_unique(&mut self.removed, path);
  }

  pub fn is_empty(&self) -> bool {
    self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
  }

  /// All paths, added then modified then removed.
  pub fn all(&self) -> impl Iterator<Item = &str> {
    self
      .added
      .iter()
      .chain(&self.modified)
      .chain(&self.removed)
      .map(String::as_str)
  }
}

fn push_unique(list: &mut Vec<String>, path: &str) {
  let p = normalize_path(path);
  if !p.is_empty() && !list.contains(&p) {
    list.push(p);
  }
}

/// Per-directory and per-extension change counts with their hotspots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSummary {
  pub directory_counts: IndexMap<String, u64>,
  pub extension_counts: IndexMap<String, u64>,
  pub top_directory: Option<String>,
  pub top_directory_count: u64,
  pub top_extension: Option<String>,
  pub top_extension_count: u64,
}

/// Count changes per directory (the containing directory and every ancestor)
/// and per extension. Ties for the top entry go to the first one observed.
pub fn analyze<'a>(paths: impl IntoIterator<Item = &'a str>) -> PathSummary {
  let mut directory_counts: IndexMap<String, u64> = IndexMap::new();
  let mut extension_counts: IndexMap<String, u64> = IndexMap::new();

  for raw in paths {
    let path = normalize_path(raw);
    if path.is_empty() {
      continue;
    }
    *extension_counts.entry(extension(&path)).or_insert(0) += 1;
    for dir in directories(&path) {
      *directory_counts.entry(dir).or_insert(0) += 1;
    }
  }

  let (top_directory, top_directory_count) = top(&directory_counts);
  let (top_extension, top_extension_count) = top(&extension_counts);
  PathSummary {
    directory_counts,
    extension_counts,
    top_directory,
    top_directory_count,
    top_extension,
    top_extension_count,
  }
}

fn top(counts: &IndexMap<String, u64>) -> (Option<String>, u64) {
  let mut best: Option<(&String, u64)> = None;
  for (key, &count) in counts {
    if best.map_or(true, |(_, c)| count > c) {
      best = Some((key, count));
    }
  }
  best.map_or((None, 0), |(k, c)| (Some(k.clone()), c))
}

/// Extension of the basename without the dot; `none` when absent. Dotfiles
/// like `.gitignore` have no extension.
pub fn extension(path: &str) -> String {
  let base = path.rsplit('/').next().unwrap_or(path);
  match base.rfind('.') {
    Some(i) if i > 0 && i + 1 < base.len() => base[i + 1..].to_string(),
    _ => NONE.to_string(),
  }
}

/// The containing directory followed by each ancestor, deepest first;
/// `["root"]` for a top-level file.
pub fn directories(path: &str) -> Vec<String> {
  let parts: Vec<&str> = path.split('/').collect();
  if parts.len() < 2 {
    return vec![ROOT.to_string()];
  }
  (1..parts.len()).rev().map(|n| parts[..n].join("/")).collect()
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./ and surrounding slashes
pub fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  let trimmed = out.strip_prefix("./").unwrap_or(&out);
  trimmed.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_path_basics() {
    assert_eq!(normalize_path("src\\auth\\jwt.go"), "src/auth/jwt.go");
    assert_eq!(normalize_path("./src//utils/index.ts"), "src/utils/index.ts");
    assert_eq!(normalize_path("SRC/App.tsx"), "SRC/App.tsx");
    assert_eq!(normalize_path("/lib/x.rb/"), "lib/x.rb");
  }

  #[test]
  fn extension_rules() {
    assert_eq!(extension("src/api.rb"), "rb");
    assert_eq!(extension("archive.tar.gz"), "gz");
    assert_eq!(extension("Makefile"), "none");
    assert_eq!(extension("config/.gitignore"), "none");
    assert_eq!(extension("weird."), "none");
    assert_eq!(extension("v1.2/README"), "none");
  }

  #[test]
  fn directories_include_ancestors() {
    assert_eq!(directories("a/b/c/file.rb"), vec!["a/b/c", "a/b", "a"]);
    assert_eq!(directories("file.rb"), vec!["root"]);
  }

  #[test]
  fn analyze_counts_and_hotspots() {
    let s = analyze(["app/models/user.rb", "app/models/post.rb", "app/views/x.erb", "README.md"]);
    assert_eq!(s.directory_counts["app"], 3);
    assert_eq!(s.directory_counts["app/models"], 2);
    assert_eq!(s.directory_counts["app/views"], 1);
    assert_eq!(s.directory_counts["root"], 1);
    assert_eq!(s.extension_counts["rb"], 2);
    // ancestors accumulate, so the shallowest shared directory wins
    assert_eq!(s.top_directory.as_deref(), Some("app"));
    assert_eq!(s.top_directory_count, 3);
    assert_eq!(s.top_extension.as_deref(), Some("rb"));
    assert_eq!(s.top_extension_count, 2);
  }

  #[test]
  fn ties_go_to_first_observed() {
    let s = analyze(["lib/a.py", "src/b.rs"]);
    assert_eq!(s.top_directory.as_deref(), Some("lib"));
    assert_eq!(s.top_extension.as_deref(), Some("py"));
  }

  #[test]
  fn empty_input() {
    let s = analyze(std::iter::empty());
    assert!(s.directory_counts.is_empty());
    assert_eq!(s.top_directory, None);
    assert_eq!(s.top_extension_count, 0);
  }

  #[test]
  fn file_changes_dedupe_and_normalize() {
    let mut fc = FileChanges::default();
    fc.push_added("./src/a.rs");
    fc.push_added("src/a.rs");
    fc.push_modified("");
    fc.push_removed("old\\b.rs");
    assert_eq!(fc.added, vec!["src/a.rs"]);
    assert!(fc.modified.is_empty());
    assert_eq!(fc.all().collect::<Vec<_>>(), vec!["src/a.rs", "old/b.rs"]);
  }
}
