use letterloop_client::ModelClient;
use letterloop_store::{keys, Artifact, ArtifactStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AnalyzerPrompts, WriterError};

/// Which upstream document an analyzer reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Job posting text to `company_analysis`
    Company,
    /// Resume text to `applicant_analysis`
    Applicant,
    /// Portfolio text to `project_analysis`
    Project,
}

impl AnalysisKind {
    pub fn artifact_key(&self) -> &'static str {
        match self {
            AnalysisKind::Company => keys::COMPANY_ANALYSIS,
            AnalysisKind::Applicant => keys::APPLICANT_ANALYSIS,
            AnalysisKind::Project => keys::PROJECT_ANALYSIS,
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            AnalysisKind::Company => "job posting",
            AnalysisKind::Applicant => "resume",
            AnalysisKind::Project => "portfolio",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisKind::Company => write!(f, "company"),
            AnalysisKind::Applicant => write!(f, "applicant"),
            AnalysisKind::Project => write!(f, "project"),
        }
    }
}

/// Turns one source document into an analysis artifact
///
/// The report replaces the current input artifact (`company_analysis` and so
/// on). With a run id it is also kept under `run=<id>/`.
pub struct Analyzer<'a> {
    kind: AnalysisKind,
    client: &'a dyn ModelClient,
    store: &'a dyn ArtifactStore,
    run_id: Option<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(kind: AnalysisKind, client: &'a dyn ModelClient, store: &'a dyn ArtifactStore) -> Self {
        Self {
            kind,
            client,
            store,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub async fn analyze(&self, source: &str) -> Result<String, WriterError> {
        if source.trim().is_empty() {
            return Err(WriterError::InputIncomplete(format!(
                "{} is empty",
                self.kind.source_name()
            )));
        }

        let prompt = AnalyzerPrompts::build_prompt(self.kind, source);
        let report = self
            .client
            .generate(&prompt, AnalyzerPrompts::system(self.kind))
            .await?;
        if report.trim().is_empty() {
            return Err(WriterError::EmptyResponse("analysis"));
        }

        if let Some(ref run_id) = self.run_id {
            let record = keys::run_scoped(run_id, self.kind.artifact_key());
            self.store.put_artifact(&Artifact::new(record, report.as_str()))?;
        }
        self.store.put_artifact(
            &Artifact::new(self.kind.artifact_key(), report.as_str()).with_attempt_index(0),
        )?;
        info!(kind = %self.kind, chars = report.chars().count(), "Analysis written");
        Ok(report)
    }
}
