use letterloop_store::{keys, ArtifactStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::WriterError;

/// Style guidance used when no rules document is supplied
pub const DEFAULT_RULES: &str = "Maintain a professional business tone.";

/// Source material for a cover letter draft.
///
/// Company and applicant analyses are required; the project analysis and
/// the rules text are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterInputs {
    pub company_analysis: Option<String>,
    pub applicant_analysis: Option<String>,
    pub project_analysis: Option<String>,
    pub rules: Option<String>,
}

impl WriterInputs {
    pub fn new(company_analysis: impl Into<String>, applicant_analysis: impl Into<String>) -> Self {
        Self {
            company_analysis: Some(company_analysis.into()),
            applicant_analysis: Some(applicant_analysis.into()),
            ..Default::default()
        }
    }

    pub fn with_project_analysis(mut self, project_analysis: impl Into<String>) -> Self {
        self.project_analysis = Some(project_analysis.into());
        self
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    /// Load the analysis artifacts written by the analyzers
    pub fn load(store: &dyn ArtifactStore, rules: Option<String>) -> Result<Self, StoreError> {
        Ok(Self {
            company_analysis: store.get(keys::COMPANY_ANALYSIS)?,
            applicant_analysis: store.get(keys::APPLICANT_ANALYSIS)?,
            project_analysis: store.get(keys::PROJECT_ANALYSIS)?,
            rules,
        })
    }

    /// Names of required inputs that are absent or blank
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if non_blank(&self.company_analysis).is_none() {
            missing.push(keys::COMPANY_ANALYSIS);
        }
        if non_blank(&self.applicant_analysis).is_none() {
            missing.push(keys::APPLICANT_ANALYSIS);
        }
        missing
    }

    pub fn ensure_complete(&self) -> Result<(), WriterError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WriterError::InputIncomplete(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    pub fn company(&self) -> &str {
        non_blank(&self.company_analysis).unwrap_or_default()
    }

    pub fn applicant(&self) -> &str {
        non_blank(&self.applicant_analysis).unwrap_or_default()
    }

    pub fn project(&self) -> Option<&str> {
        non_blank(&self.project_analysis)
    }

    pub fn rules_or_default(&self) -> &str {
        non_blank(&self.rules).unwrap_or(DEFAULT_RULES)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
