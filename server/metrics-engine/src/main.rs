//! Binary entrypoint: read JSON lines from stdin, write JSON lines to stdout.
//!
//! Each input line is an InboundEvent. Output lines are either:
//! - A ClassifiedOutput (the event name plus its metrics, possibly none)
//! - An ErrorOutput (when input validation or classification fails)
//!
//! Logs go to stderr; `RUST_LOG` controls the level (default `info`).
//! `METRICS_ENGINE_CONFIG` may point at a JSON config file.

use std::io::{self, BufRead, Write};
use std::path::Path;

use metrics_engine::types::ErrorOutput;
use metrics_engine::{Config, EngineError, InboundEvent, MetricClassifier};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let config = match std::env::var("METRICS_ENGINE_CONFIG") {
    Ok(path) => match Config::from_path(Path::new(&path)) {
      Ok(c) => {
        info!(path = %path, "loaded config");
        c
      }
      Err(e) => {
        error!(error = %e, "failed to load config");
        std::process::exit(2);
      }
    },
    Err(_) => Config::default(),
  };
  let engine = MetricClassifier::new(config);

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  let mut processed = 0u64;

  for line in stdin.lock().lines() {
    let line = match line {
      Ok(l) => l,
      Err(e) => {
        error!(error = %e, "read error");
        std::process::exit(1);
      }
    };

    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let raw: InboundEvent = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        warn!(error = %e, "unparseable input line");
        write_line(&mut out, &ErrorOutput::new(format!("json parse: {}", e)));
        continue;
      }
    };

    match engine.process(&raw) {
      Ok(classified) => {
        processed += 1;
        write_line(&mut out, &classified);
      }
      Err(e) => {
        warn!(event = %raw.name, error = %e, "event rejected");
        let err = match &e {
          EngineError::Validation { field, reason } => ErrorOutput::new(reason.clone()).with_field(field.clone()),
          _ => ErrorOutput::new(e.to_string()),
        };
        write_line(&mut out, &err);
      }
    }
  }

  let _ = out.flush();
  info!(processed, "done");
}

fn write_line<W: Write, T: serde::Serialize>(out: &mut W, value: &T) {
  let _ = serde_json::to_writer(&mut *out, value);
  let _ = writeln!(out);
}
