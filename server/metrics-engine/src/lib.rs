//! PushLog Metrics Engine: deterministic webhook event classification.
//!
//! Takes already-parsed event envelopes from GitHub, Jira, Bitbucket and CI
//! systems, routes each by its name prefix to a per-source classifier, and
//! returns normalized, dimensioned metric definitions for DORA and
//! engineering-productivity reporting.
//!
//! No DB, no network; pure computation with no state carried between events.

pub mod classifiers;
pub mod commit;
pub mod config;
pub mod dimensions;
pub mod emit;
pub mod engine;
pub mod error;
pub mod naming;
pub mod normalize;
pub mod paths;
pub mod payload;
pub mod time;
pub mod types;

pub use classifiers::{Source, SourceClassifier};
pub use config::Config;
pub use engine::MetricClassifier;
pub use error::EngineError;
pub use naming::{MetricName, MetricNamingRules};
pub use types::{ClassificationResult, Event, InboundEvent, MetricDefinition};
