//! Artifact records and key naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known artifact names.
///
/// Per-attempt artifacts are written under `kind@attempt=N`, prefixed with
/// `run=<id>/` so that runs sharing a database never collide. Those keys are
/// written once. Only the `kind@latest` aliases and the current analysis
/// inputs are re-pointed.
pub mod keys {
    use uuid::Uuid;

    pub const JOB_POSTING: &str = "job_posting";
    pub const COMPANY_ANALYSIS: &str = "company_analysis";
    pub const APPLICANT_ANALYSIS: &str = "applicant_analysis";
    pub const PROJECT_ANALYSIS: &str = "project_analysis";
    pub const RUBRIC: &str = "rubric";
    pub const DRAFT: &str = "draft";
    pub const SCORECARD: &str = "scorecard";

    /// Inputs the writer reads; each `analyze` run replaces them
    pub const INPUTS: [&str; 4] = [JOB_POSTING, COMPANY_ANALYSIS, APPLICANT_ANALYSIS, PROJECT_ANALYSIS];

    const ATTEMPT_MARKER: &str = "@attempt=";
    const LATEST_SUFFIX: &str = "@latest";
    const RUN_PREFIX: &str = "run=";

    /// `draft@attempt=3`
    pub fn attempt(kind: &str, attempt: usize) -> String {
        format!("{}{}{}", kind, ATTEMPT_MARKER, attempt)
    }

    /// `draft@latest`
    pub fn latest(kind: &str) -> String {
        format!("{}{}", kind, LATEST_SUFFIX)
    }

    /// `run=1a2b3c4d/draft@attempt=3`
    pub fn run_scoped(run_id: &str, name: &str) -> String {
        format!("{}{}/{}", RUN_PREFIX, run_id, name)
    }

    /// Prefix matching every artifact written by one run
    pub fn run_prefix(run_id: &str) -> String {
        format!("{}{}/", RUN_PREFIX, run_id)
    }

    /// Short random run identifier
    pub fn new_run_id() -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    /// True for keys that may be overwritten
    pub fn is_replaceable(name: &str) -> bool {
        name.ends_with(LATEST_SUFFIX) || INPUTS.contains(&name)
    }

    /// Attempt number encoded in a key, 0 for attempt-independent keys
    pub fn attempt_index_of(name: &str) -> usize {
        name.rsplit_once(ATTEMPT_MARKER)
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(0)
    }
}

/// A named text blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    pub content: String,
    pub attempt_index: usize,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Build an artifact, deriving the attempt index from the key
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attempt_index: keys::attempt_index_of(&name),
            name,
            content: content.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_attempt_index(mut self, attempt_index: usize) -> Self {
        self.attempt_index = attempt_index;
        self
    }
}
