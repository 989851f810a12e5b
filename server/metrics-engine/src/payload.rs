//! Tolerant access into webhook payload trees.
//!
//! Every accessor returns `None` for absent keys, `null`, or a value of the
//! wrong shape. Numbers and booleans encoded as strings are accepted.

use serde_json::Value;

/// Walk `path` through nested objects (and arrays, for numeric segments).
pub fn dig<'a>(v: &'a Value, path: &[&str]) -> Option<&'a Value> {
  let mut cur = v;
  for key in path {
    cur = match cur {
      Value::Object(map) => map.get(*key)?,
      Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
      _ => return None,
    };
  }
  if cur.is_null() {
    None
  } else {
    Some(cur)
  }
}

/// Non-empty string at `path`. Numbers and booleans are rendered as text.
pub fn string(v: &Value, path: &[&str]) -> Option<String> {
  match dig(v, path)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// First non-empty string among several paths.
pub fn first_string(v: &Value, paths: &[&[&str]]) -> Option<String> {
  paths.iter().find_map(|p| string(v, p))
}

pub fn int(v: &Value, path: &[&str]) -> Option<i64> {
  match dig(v, path)? {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

pub fn float(v: &Value, path: &[&str]) -> Option<f64> {
  match dig(v, path)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

pub fn boolean(v: &Value, path: &[&str]) -> Option<bool> {
  match dig(v, path)? {
    Value::Bool(b) => Some(*b),
    Value::Number(n) => n.as_f64().map(|f| f != 0.0),
    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
      "true" | "yes" | "y" | "t" | "on" | "1" => Some(true),
      "false" | "no" | "n" | "f" | "off" | "0" => Some(false),
      _ => None,
    },
    _ => None,
  }
}

/// Array at `path`; empty slice when absent.
pub fn array<'a>(v: &'a Value, path: &[&str]) -> &'a [Value] {
  match dig(v, path) {
    Some(Value::Array(items)) => items,
    _ => &[],
  }
}

/// Array of strings at `path`, skipping non-string entries.
pub fn strings(v: &Value, path: &[&str]) -> Vec<String> {
  array(v, path)
    .iter()
    .filter_map(|item| item.as_str())
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}
