use letterloop_client::{ClientError, ModelClient, ModelMode};
use letterloop_store::{keys, Artifact, ArtifactStore, StoreError};
use tracing::{debug, info};

use crate::{
    parse_total, sum_criterion_scores, CriticPrompts, Rubric, RubricSpec, Scorecard,
    TotalParseError, TotalStrategy,
};

/// Grades drafts against a rubric derived from the rules document
pub struct Critic<'a> {
    client: &'a dyn ModelClient,
    store: &'a dyn ArtifactStore,
    spec: RubricSpec,
    strategy: TotalStrategy,
    run_id: Option<String>,
}

impl<'a> Critic<'a> {
    pub fn new(client: &'a dyn ModelClient, store: &'a dyn ArtifactStore) -> Self {
        Self {
            client,
            store,
            spec: RubricSpec::default(),
            strategy: TotalStrategy::default(),
            run_id: None,
        }
    }

    /// Write the rubric and per-attempt scorecards under `run=<id>/`
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn with_spec(mut self, spec: RubricSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_strategy(mut self, strategy: TotalStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn spec(&self) -> &RubricSpec {
        &self.spec
    }

    pub fn strategy(&self) -> TotalStrategy {
        self.strategy
    }

    fn scoped(&self, name: &str) -> String {
        match self.run_id {
            Some(ref run_id) => keys::run_scoped(run_id, name),
            None => name.to_string(),
        }
    }

    /// Derive the grading criteria from the rules text. Called once per run.
    pub async fn derive_rubric(&self, rules: &str) -> Result<Rubric, CriticError> {
        if rules.trim().is_empty() {
            return Err(CriticError::MissingRules);
        }

        let prompt = CriticPrompts::build_rubric_prompt(rules, &self.spec);
        debug!(prompt_len = prompt.len(), "Deriving rubric");

        let text = self
            .client
            .generate(&prompt, CriticPrompts::RUBRIC_SYSTEM)
            .await?;
        if text.trim().is_empty() {
            return Err(CriticError::EmptyResponse("rubric"));
        }

        let rubric = Rubric::from_text(text, self.spec);
        self.store
            .put_artifact(&Artifact::new(self.scoped(keys::RUBRIC), rubric.text.as_str()))?;

        info!(criteria = rubric.criteria.len(), "Rubric derived");
        Ok(rubric)
    }

    /// Produce a scorecard for `draft` and persist it for `attempt`
    pub async fn score(
        &self,
        rubric: &Rubric,
        draft: &str,
        attempt: usize,
    ) -> Result<Scorecard, CriticError> {
        let prompt = CriticPrompts::build_scoring_prompt(&rubric.text, draft, &rubric.spec);
        debug!(attempt, prompt_len = prompt.len(), "Scoring draft");

        let text = self
            .client
            .generate(&prompt, CriticPrompts::SCORING_SYSTEM)
            .await?;
        if text.trim().is_empty() {
            return Err(CriticError::EmptyResponse("scorecard"));
        }

        self.store
            .put_artifact(&Artifact::new(
                self.scoped(&keys::attempt(keys::SCORECARD, attempt)),
                text.as_str(),
            ))?;
        self.store.put_artifact(
            &Artifact::new(keys::latest(keys::SCORECARD), text.as_str()).with_attempt_index(attempt),
        )?;

        Ok(Scorecard { attempt, text })
    }

    /// Re-derive the integer total of a scorecard
    pub async fn extract_total(&self, scorecard: &str) -> Result<u32, CriticError> {
        let total = match self.strategy {
            TotalStrategy::Model => {
                let prompt = CriticPrompts::build_total_prompt(scorecard);
                let response = self
                    .client
                    .invoke(&prompt, Some(CriticPrompts::TOTAL_SYSTEM), ModelMode::Lite)
                    .await?;
                debug!(response = %response.trim(), "Total extraction response");
                parse_total(&response, self.spec.max_total())?
            }
            TotalStrategy::Local => sum_criterion_scores(scorecard, &self.spec)?,
        };

        info!(total, strategy = ?self.strategy, "Total extracted");
        Ok(total)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CriticError {
    #[error("Rules document is missing or empty")]
    MissingRules,

    #[error("Model call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Model returned an empty {0}")]
    EmptyResponse(&'static str),

    #[error("Could not extract total score: {0}")]
    Parse(#[from] TotalParseError),

    #[error("Failed to persist artifact: {0}")]
    Store(#[from] StoreError),
}
