//! Rule table and dispatcher
//!
//! Each [`Rule`] maps a recognized file identity to the ordered list of
//! transforms it receives. Every matching rule applies; within a rule every
//! transform runs, and the results are OR-ed together.

use std::path::Path;

use tracing::{debug, info};

use crate::document::{Codec, Document};
use crate::error::Result;
use crate::transforms;

/// How a rule recognizes the file it applies to
#[derive(Debug, Clone, Copy)]
pub enum Identity {
    /// Declared `name:` is one of `names`, or the base name equals `file`
    DeclaredNameOrFile {
        names: &'static [&'static str],
        file: &'static str,
    },
    /// Base name equals the given file name
    FileName(&'static str),
}

impl Identity {
    pub fn matches(&self, declared_name: Option<&str>, file_name: &str) -> bool {
        match self {
            Identity::DeclaredNameOrFile { names, file } => {
                declared_name.is_some_and(|n| names.contains(&n)) || *file == file_name
            }
            Identity::FileName(file) => *file == file_name,
        }
    }
}

/// One transform invocation with its parameters bound
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    ForceRunInput,
    PreinitForceRunOutputs,
    HostedPreflight {
        job: &'static str,
    },
    SessionIndexPostMatrix {
        job: &'static str,
    },
    SessionIndexPost {
        job: &'static str,
        results_dir: &'static str,
        artifact_name: &'static str,
    },
    RunnerUnblockGuard {
        job: &'static str,
        snapshot_path: &'static str,
    },
    /// Run members in order, stopping at the first that reports a change
    FirstChanged(&'static [Transform]),
}

impl Transform {
    pub fn apply(&self, doc: &mut Document) -> bool {
        let changed = match *self {
            Transform::ForceRunInput => transforms::ensure_force_run_input(doc),
            Transform::PreinitForceRunOutputs => {
                transforms::ensure_preinit_force_run_outputs(doc)
            }
            Transform::HostedPreflight { job } => transforms::ensure_hosted_preflight(doc, job),
            Transform::SessionIndexPostMatrix { job } => {
                transforms::ensure_session_index_post_matrix(doc, job)
            }
            Transform::SessionIndexPost {
                job,
                results_dir,
                artifact_name,
            } => transforms::ensure_session_index_post(doc, job, results_dir, artifact_name),
            Transform::RunnerUnblockGuard { job, snapshot_path } => {
                transforms::ensure_runner_unblock_guard(doc, job, snapshot_path)
            }
            Transform::FirstChanged(members) => members.iter().any(|t| t.apply(doc)),
        };
        debug!(transform = ?self, changed, "applied transform");
        changed
    }
}

/// A recognized file identity and the transforms it receives, in order
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub identity: Identity,
    pub transforms: &'static [Transform],
}

const MATRIX_SNAPSHOT: &str = "tests/results/${{ matrix.category }}/runner-unblock-snapshot.json";
const RESULTS_SNAPSHOT: &str = "tests/results/runner-unblock-snapshot.json";

/// Built-in rules for the repository's workflow files
pub static RULES: &[Rule] = &[
    Rule {
        identity: Identity::DeclaredNameOrFile {
            names: &["Pester (self-hosted)", "Pester (integration)"],
            file: "pester-selfhosted.yml",
        },
        transforms: &[Transform::ForceRunInput, Transform::PreinitForceRunOutputs],
    },
    Rule {
        identity: Identity::FileName("fixture-drift.yml"),
        transforms: &[
            Transform::HostedPreflight {
                job: "preflight-windows",
            },
            Transform::SessionIndexPost {
                job: "validate-windows",
                results_dir: "results/fixture-drift",
                artifact_name: "fixture-drift-session-index",
            },
        ],
    },
    Rule {
        identity: Identity::FileName("ci-orchestrated.yml"),
        transforms: &[
            Transform::HostedPreflight { job: "preflight" },
            Transform::SessionIndexPostMatrix { job: "pester" },
            Transform::SessionIndexPostMatrix {
                job: "pester-category",
            },
            Transform::RunnerUnblockGuard {
                job: "drift",
                snapshot_path: "results/fixture-drift/runner-unblock-snapshot.json",
            },
            Transform::RunnerUnblockGuard {
                job: "pester",
                snapshot_path: MATRIX_SNAPSHOT,
            },
            Transform::RunnerUnblockGuard {
                job: "pester-category",
                snapshot_path: MATRIX_SNAPSHOT,
            },
        ],
    },
    Rule {
        identity: Identity::FileName("ci-orchestrated-v2.yml"),
        transforms: &[
            Transform::HostedPreflight { job: "preflight" },
            Transform::FirstChanged(&[
                Transform::SessionIndexPostMatrix {
                    job: "pester-category",
                },
                Transform::SessionIndexPostMatrix { job: "pester" },
            ]),
            Transform::RunnerUnblockGuard {
                job: "orchestrated",
                snapshot_path: RESULTS_SNAPSHOT,
            },
        ],
    },
    Rule {
        identity: Identity::FileName("pester-integration-on-label.yml"),
        transforms: &[
            Transform::SessionIndexPost {
                job: "pester-integration",
                results_dir: "tests/results",
                artifact_name: "pester-integration-session-index",
            },
            Transform::RunnerUnblockGuard {
                job: "pester-integration",
                snapshot_path: RESULTS_SNAPSHOT,
            },
        ],
    },
    Rule {
        identity: Identity::FileName("smoke.yml"),
        transforms: &[
            Transform::RunnerUnblockGuard {
                job: "compare",
                snapshot_path: RESULTS_SNAPSHOT,
            },
            Transform::SessionIndexPost {
                job: "compare",
                results_dir: "tests/results",
                artifact_name: "smoke-session-index",
            },
        ],
    },
    Rule {
        identity: Identity::FileName("compare-artifacts.yml"),
        transforms: &[
            Transform::SessionIndexPost {
                job: "publish",
                results_dir: "tests/results",
                artifact_name: "compare-session-index",
            },
            Transform::RunnerUnblockGuard {
                job: "publish",
                snapshot_path: RESULTS_SNAPSHOT,
            },
        ],
    },
];

/// Result of running the dispatcher over one file
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub changed: bool,
    /// Re-serialized document when changed, the untouched source otherwise
    pub text: String,
}

/// Applies the rule table through a codec
#[derive(Debug, Clone)]
pub struct Updater {
    codec: Codec,
    rules: &'static [Rule],
}

impl Default for Updater {
    fn default() -> Self {
        Self::new(Codec::default())
    }
}

impl Updater {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            rules: RULES,
        }
    }

    pub fn with_rules(mut self, rules: &'static [Rule]) -> Self {
        self.rules = rules;
        self
    }

    /// Rules whose identity matches the document and file name
    pub fn matching_rules<'a>(
        &'a self,
        doc: &'a Document,
        file_name: &'a str,
    ) -> impl Iterator<Item = &'static Rule> + 'a {
        let declared = doc.name();
        self.rules
            .iter()
            .filter(move |rule| rule.identity.matches(declared, file_name))
    }

    /// Run every applicable transform; true if any changed the document
    pub fn apply_document(&self, doc: &mut Document, file_name: &str) -> bool {
        let selected: Vec<&'static Rule> = self.matching_rules(doc, file_name).collect();
        let mut changed = false;
        for rule in selected {
            for transform in rule.transforms {
                changed |= transform.apply(doc);
            }
        }
        changed
    }

    /// Apply to in-memory source text identified by `file_name`
    pub fn apply_text(&self, file_name: &str, text: &str) -> Result<Outcome> {
        let mut doc = self.codec.parse(text)?;
        if self.apply_document(&mut doc, file_name) {
            Ok(Outcome {
                changed: true,
                text: self.codec.dump(&doc)?,
            })
        } else {
            Ok(Outcome {
                changed: false,
                text: text.to_string(),
            })
        }
    }

    /// Load `path` and apply the rules selected by its name and content
    pub fn apply(&self, path: &Path) -> Result<Outcome> {
        let (text, mut doc) = self.codec.load(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !self.apply_document(&mut doc, &file_name) {
            debug!(path = %path.display(), "no changes");
            return Ok(Outcome {
                changed: false,
                text,
            });
        }

        info!(path = %path.display(), "document changed");
        Ok(Outcome {
            changed: true,
            text: self.codec.dump(&doc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    const SMOKE: &str = "name: Smoke\njobs:\n  compare:\n    steps:\n      - uses: actions/checkout@v5\n";

    fn step_names(text: &str, job: &str) -> Vec<String> {
        let root: Value = serde_yaml::from_str(text).unwrap();
        root["jobs"][job]["steps"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|s| s.get("name").and_then(Value::as_str).unwrap_or("-").to_string())
            .collect()
    }

    #[test]
    fn identity_by_declared_name_or_file() {
        let id = RULES[0].identity;
        assert!(id.matches(Some("Pester (self-hosted)"), "renamed.yml"));
        assert!(id.matches(Some("Pester (integration)"), "other.yml"));
        assert!(id.matches(None, "pester-selfhosted.yml"));
        assert!(!id.matches(Some("Smoke"), "smoke.yml"));
    }

    #[test]
    fn file_identity_ignores_declared_name() {
        let id = Identity::FileName("fixture-drift.yml");
        assert!(id.matches(Some("Anything"), "fixture-drift.yml"));
        assert!(!id.matches(Some("fixture-drift.yml"), "drift.yml"));
    }

    #[test]
    fn smoke_gets_guard_then_session_index() {
        let updater = Updater::default();
        let outcome = updater.apply_text("smoke.yml", SMOKE).unwrap();
        assert!(outcome.changed);
        assert_eq!(
            step_names(&outcome.text, "compare"),
            ["-", "Runner Unblock Guard", "Session index post (best-effort)"]
        );

        let again = updater.apply_text("smoke.yml", &outcome.text).unwrap();
        assert!(!again.changed);
        assert_eq!(again.text, outcome.text);
    }

    #[test]
    fn compare_artifacts_gets_session_index_then_guard() {
        let text = "jobs:\n  publish:\n    steps: []\n";
        let outcome = Updater::default()
            .apply_text("compare-artifacts.yml", text)
            .unwrap();
        assert_eq!(
            step_names(&outcome.text, "publish"),
            ["Session index post (best-effort)", "Runner Unblock Guard"]
        );
    }

    #[test]
    fn ci_orchestrated_matrix_post_precedes_guard() {
        let text = "jobs:\n  pester:\n    steps: []\n";
        let outcome = Updater::default()
            .apply_text("ci-orchestrated.yml", text)
            .unwrap();
        assert_eq!(
            step_names(&outcome.text, "pester"),
            ["Session index post", "Runner Unblock Guard"]
        );
    }

    #[test]
    fn unrecognized_file_passes_through_byte_for_byte() {
        let text = "# keep me\nname:   'Odd   spacing'\njobs: {compare: {steps: []}}\n";
        let outcome = Updater::default().apply_text("release.yml", text).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.text, text);
    }

    #[test]
    fn first_changed_stops_after_first_success() {
        let text = "jobs:\n  pester-category:\n    steps: []\n  pester:\n    steps: []\n";
        let outcome = Updater::default()
            .apply_text("ci-orchestrated-v2.yml", text)
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(step_names(&outcome.text, "pester-category"), ["Session index post"]);
        assert!(step_names(&outcome.text, "pester").is_empty());
    }

    #[test]
    fn first_changed_falls_through_to_next_member() {
        let text = "jobs:\n  pester:\n    steps: []\n";
        let outcome = Updater::default()
            .apply_text("ci-orchestrated-v2.yml", text)
            .unwrap();
        assert_eq!(step_names(&outcome.text, "pester"), ["Session index post"]);
    }

    #[test]
    fn custom_rule_table() {
        static ONLY_GUARD: &[Rule] = &[Rule {
            identity: Identity::FileName("custom.yml"),
            transforms: &[Transform::RunnerUnblockGuard {
                job: "build",
                snapshot_path: "snap.json",
            }],
        }];
        let updater = Updater::default().with_rules(ONLY_GUARD);
        let outcome = updater
            .apply_text("custom.yml", "jobs:\n  build:\n    steps: []\n")
            .unwrap();
        assert_eq!(step_names(&outcome.text, "build"), ["Runner Unblock Guard"]);

        let untouched = updater.apply_text("smoke.yml", SMOKE).unwrap();
        assert!(!untouched.changed);
    }

    #[test]
    fn parse_failure_propagates() {
        let err = Updater::default().apply_text("smoke.yml", "jobs: [").unwrap_err();
        assert_eq!(err.code(), "WFU-002");
    }
}
