use chrono::Utc;
use proptest::prelude::*;
use proptest::sample::select;
use serde_json::{json, Value};

use metrics_engine::classifiers::BitbucketEventClassifier;
use metrics_engine::commit::{self, COMMIT_TYPES};
use metrics_engine::paths;
use metrics_engine::{Event, MetricNamingRules, SourceClassifier};

fn segment() -> impl Strategy<Value = String> {
  "[a-z][a-z0-9_]{0,11}"
}

const PUSH_ACTIONS: &[&str] = &[
  "total",
  "branch_activity",
  "commits",
  "by_author",
  "unique_authors",
  "commit_type",
  "breaking_change",
  "files_added",
  "files_modified",
  "files_removed",
  "directory_hotspot",
  "directory_changes",
  "filetype_hotspot",
  "filetype_changes",
  "code_additions",
  "code_deletions",
  "code_churn",
];

/// Names from the closed part of the built-in vocabulary, as
/// `(source, entity, action, detail)`.
fn closed_name() -> impl Strategy<Value = (&'static str, String, String, Option<String>)> {
  prop_oneof![
    select(PUSH_ACTIONS).prop_map(|a| ("github", "push".to_string(), a.to_string(), None::<String>)),
    (
      select(vec!["test", "build", "deploy", "check", "install", "publish"]),
      select(vec!["duration", "success", "failure"]),
    )
      .prop_map(|(t, d)| ("github", "workflow_step".to_string(), t.to_string(), Some(d.to_string()))),
    (select(vec!["build", "deploy", "test", "lead_time"]), segment())
      .prop_map(|(kind, d)| ("github", "ci".to_string(), kind.to_string(), Some(d))),
    Just(("github", "commit_volume".to_string(), "daily".to_string(), None::<String>)),
    select(vec!["attempt", "failure", "success"])
      .prop_map(|a| ("dora", "deployment".to_string(), a.to_string(), None::<String>)),
    (select(vec!["build", "deploy", "test"]), segment())
      .prop_map(|(kind, a)| ("ci", kind.to_string(), a, None::<String>)),
    Just(("ci", "lead_time".to_string(), "seconds".to_string(), None::<String>)),
    (select(vec!["issue", "sprint", "worklog", "comment"]), segment())
      .prop_map(|(e, a)| ("jira", e.to_string(), a, None::<String>)),
    (select(vec!["pull_request", "build"]), segment())
      .prop_map(|(e, a)| ("bitbucket", e.to_string(), a, None::<String>)),
  ]
}

/// Entity no built-in source lists explicitly.
fn unlisted_entity() -> impl Strategy<Value = String> {
  "ext_[a-z0-9_]{0,8}"
}

fn payload() -> impl Strategy<Value = Value> {
  let leaf = prop_oneof![
    Just(Value::Null),
    any::<bool>().prop_map(Value::from),
    any::<i64>().prop_map(Value::from),
    "[ -~]{0,16}".prop_map(Value::from),
  ];
  leaf.prop_recursive(3, 24, 4, |inner| {
    prop_oneof![
      proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
      proptest::collection::btree_map(
        prop_oneof![
          Just("push".to_string()),
          Just("changes".to_string()),
          Just("commits".to_string()),
          Just("pullrequest".to_string()),
          Just("commit_status".to_string()),
          Just("state".to_string()),
          Just("message".to_string()),
          "[a-z_]{1,8}",
        ],
        inner,
        0..4,
      )
      .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
  })
}

proptest! {
  #[test]
  fn metric_names_round_trip((source, entity, action, detail) in closed_name()) {
    let rules = MetricNamingRules::default();
    let name = rules.build(source, &entity, &action, detail.as_deref()).unwrap();
    let parsed = rules.parse(&name.to_string()).unwrap();
    prop_assert_eq!(rules.parse(&parsed.to_string()), Some(parsed.clone()));
    prop_assert_eq!(parsed, name);
  }

  #[test]
  fn generic_names_round_trip(source in prop_oneof![Just("github"), Just("jira"), Just("bitbucket"), Just("gitlab"), Just("task")],
                              entity in unlisted_entity(),
                              action in segment()) {
    let rules = MetricNamingRules::default();
    prop_assert!(rules.build(source, &entity, &action, None).is_err());
    let name = rules.build_generic(source, &entity, &action).unwrap();
    let parsed = rules.parse(&name.to_string()).unwrap();
    prop_assert_eq!(rules.parse(&parsed.to_string()), Some(parsed.clone()));
    prop_assert_eq!(parsed, name);
  }

  #[test]
  fn closed_entities_reject_unknown_actions(action in "[a-z]{12}") {
    let rules = MetricNamingRules::default();
    prop_assert!(rules.build("github", "push", &action, None).is_err());
    prop_assert!(rules.build("dora", "deployment", &action, None).is_err());
    let step_name = format!("github.workflow_step.{}.duration", action);
    prop_assert!(!rules.is_valid(&step_name));
  }

  #[test]
  fn conventional_type_is_lowercased(idx in 0..COMMIT_TYPES.len(),
                                     upper in any::<bool>(),
                                     scope in proptest::option::of("[a-z]{1,8}"),
                                     bang in any::<bool>(),
                                     description in "[a-z ]{0,20}") {
    let declared = if upper { COMMIT_TYPES[idx].to_uppercase() } else { COMMIT_TYPES[idx].to_string() };
    let message = format!(
      "{}{}{}: {}",
      declared,
      scope.as_ref().map(|s| format!("({})", s)).unwrap_or_default(),
      if bang { "!" } else { "" },
      description
    );
    let parts = commit::parse(&message);
    prop_assert!(parts.conventional);
    prop_assert_eq!(parts.commit_type.as_deref(), Some(COMMIT_TYPES[idx]));
    prop_assert_eq!(parts.scope, scope);
    prop_assert_eq!(parts.breaking, bang);
  }

  #[test]
  fn inferred_type_stays_in_vocabulary(message in "[A-Za-z !,]{1,48}") {
    prop_assume!(!message.trim().is_empty());
    let parts = commit::parse(&message);
    prop_assert!(!parts.conventional);
    let commit_type = parts.commit_type.unwrap();
    prop_assert!(COMMIT_TYPES.contains(&commit_type.as_str()), "{}", commit_type);
  }

  #[test]
  fn directory_counts_grow_toward_root(files in proptest::collection::vec("([a-z]{1,4}/){0,4}[a-z]{1,6}(\\.[a-z]{1,3})?", 1..12)) {
    let summary = paths::analyze(files.iter().map(String::as_str));
    for file in &files {
      let dirs = paths::directories(&paths::normalize_path(file));
      let counts: Vec<u64> = dirs.iter().map(|d| summary.directory_counts[d.as_str()]).collect();
      prop_assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?} {:?}", dirs, counts);
    }
    prop_assert!(summary.top_directory_count >= 1);
  }

  #[test]
  fn bitbucket_never_fails(name in "bitbucket\\.[a-z:_ ]{0,20}(\\.[a-z_]{0,10})?", data in payload()) {
    let event = Event {
      id: None,
      name,
      source: "bitbucket".into(),
      timestamp: Utc::now(),
      data: json!({"push": data.clone(), "pullrequest": data.clone(), "commit_status": data}),
    };
    prop_assert!(BitbucketEventClassifier::default().classify(&event).is_ok());
  }
}
