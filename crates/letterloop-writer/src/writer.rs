use letterloop_client::ModelClient;
use letterloop_store::{keys, Artifact, ArtifactStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{WriterError, WriterInputs, WriterPrompts};

/// One generated cover letter draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub attempt: usize,
    /// Store key the draft was written under
    pub key: String,
    pub text: String,
}

/// Drafts cover letters and persists each attempt
pub struct CoverLetterWriter<'a> {
    client: &'a dyn ModelClient,
    store: &'a dyn ArtifactStore,
    run_id: Option<String>,
}

impl<'a> CoverLetterWriter<'a> {
    pub fn new(client: &'a dyn ModelClient, store: &'a dyn ArtifactStore) -> Self {
        Self {
            client,
            store,
            run_id: None,
        }
    }

    /// Write per-attempt drafts under `run=<id>/`
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Store key for the draft of `attempt`
    pub fn draft_key(&self, attempt: usize) -> String {
        let key = self.draft_key(attempt);
        match self.run_id {
            Some(ref run_id) => keys::run_scoped(run_id, &key),
            None => key,
        }
    }

    /// Produce the draft for `attempt`.
    ///
    /// Attempt 1 drafts from the inputs alone. Later attempts require the
    /// previous draft and its scorecard, which are passed to the model
    /// verbatim. Writes `draft@attempt=N` (scoped to the run when one is
    /// set) and re-points `draft@latest`.
    pub async fn generate(
        &self,
        attempt: usize,
        inputs: &WriterInputs,
        prior_draft: Option<&str>,
        prior_feedback: Option<&str>,
    ) -> Result<Draft, WriterError> {
        inputs.ensure_complete()?;

        let prompt = if attempt <= 1 {
            WriterPrompts::build_draft_prompt(inputs)
        } else {
            match (prior_draft, prior_feedback) {
                (Some(draft), Some(feedback)) => {
                    WriterPrompts::build_revision_prompt(inputs, draft, feedback)
                }
                (None, _) => {
                    return Err(WriterError::InputIncomplete(format!(
                        "attempt {} has no prior draft",
                        attempt
                    )))
                }
                (_, None) => {
                    return Err(WriterError::InputIncomplete(format!(
                        "attempt {} has no prior feedback",
                        attempt
                    )))
                }
            }
        };

        debug!(attempt, prompt_len = prompt.len(), "Generating draft");
        let text = self.client.generate(&prompt, WriterPrompts::SYSTEM).await?;
        if text.trim().is_empty() {
            return Err(WriterError::EmptyResponse("draft"));
        }

        let key = self.draft_key(attempt);
        self.store
            .put_artifact(&Artifact::new(key.as_str(), text.as_str()))?;
        self.store.put_artifact(
            &Artifact::new(keys::latest(keys::DRAFT), text.as_str()).with_attempt_index(attempt),
        )?;

        info!(attempt, chars = text.chars().count(), key = %key, "Draft written");
        Ok(Draft { attempt, key, text })
    }
}
