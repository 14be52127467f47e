use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use letterloop_critic::{Critic, CriticError, Rubric, Verdict};
use letterloop_logging::{LogEvent, Logger, RunLog};
use letterloop_store::keys;
use letterloop_writer::{CoverLetterWriter, WriterError};

use crate::context::{AttemptRecord, LoopPhase, LoopSettings};
use crate::error::LoopError;
use crate::outcome::RunOutcome;
use crate::RunState;

/// A failed cycle, with the verdict when it came from scoring
struct AttemptFailure {
    error: LoopError,
    verdict: Option<Verdict>,
}

impl From<LoopError> for AttemptFailure {
    fn from(error: LoopError) -> Self {
        Self {
            error,
            verdict: None,
        }
    }
}

impl From<WriterError> for AttemptFailure {
    fn from(error: WriterError) -> Self {
        LoopError::from(error).into()
    }
}

impl From<CriticError> for AttemptFailure {
    fn from(error: CriticError) -> Self {
        LoopError::from(error).into()
    }
}

/// Drives the writer and the critic until a draft is accepted.
///
/// Every artifact a run writes is scoped under its run id, so two runs
/// against one store never overwrite each other.
pub struct LoopRunner<'a> {
    run_id: String,
    writer: CoverLetterWriter<'a>,
    critic: Critic<'a>,
    settings: LoopSettings,
    logger: Arc<Logger>,
    run_log: Option<Arc<RunLog>>,
    interrupted: Arc<AtomicBool>,
}

impl<'a> LoopRunner<'a> {
    pub fn new(
        writer: CoverLetterWriter<'a>,
        critic: Critic<'a>,
        settings: LoopSettings,
        logger: Arc<Logger>,
    ) -> Self {
        let run_id = keys::new_run_id();
        Self {
            writer: writer.with_run_id(run_id.as_str()),
            critic: critic.with_run_id(run_id.as_str()),
            run_id,
            settings,
            logger,
            run_log: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self.writer = self.writer.with_run_id(self.run_id.as_str());
        self.critic = self.critic.with_run_id(self.run_id.as_str());
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn with_run_log(mut self, run_log: Arc<RunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run draft-and-grade cycles until a terminal outcome.
    ///
    /// Every failure is folded into [`RunOutcome::Fatal`]; nothing escapes.
    pub async fn run(&self, mut state: RunState) -> RunOutcome {
        self.logger.log(&LogEvent::RunStarted {
            run_id: self.run_id.clone(),
            threshold: self.settings.threshold,
            max_attempts: self.settings.max_attempts,
            total_strategy: self.critic.strategy().to_string(),
        });

        let outcome = self.drive(&mut state).await;
        self.finish(&outcome);
        outcome
    }

    async fn drive(&self, state: &mut RunState) -> RunOutcome {
        let has_rules = state
            .inputs
            .rules
            .as_deref()
            .is_some_and(|rules| !rules.trim().is_empty());
        if !has_rules {
            return self.fatal(state, LoopError::MissingRules, None);
        }
        if let Err(reason) = self.settings.check_against(self.critic.spec()) {
            return self.fatal(state, LoopError::Config(reason), None);
        }

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("Run interrupted by user");
                return RunOutcome::interrupted(
                    state.attempts_completed(),
                    state.history.clone(),
                    state.total_duration(),
                );
            }

            if !state.within_limit(&self.settings) {
                let attempts = state.attempts_completed();
                self.logger.log(&LogEvent::MaxAttemptsReached {
                    attempts,
                    best_total: state.best_total(),
                });
                return RunOutcome::max_attempts_reached(
                    attempts,
                    state.best_total(),
                    state.history.clone(),
                    state.total_duration(),
                );
            }

            match self.run_attempt(state).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {
                    if state.is_stalled(&self.settings) {
                        let attempts = state.attempts_completed();
                        self.logger.log(&LogEvent::Stalled {
                            attempts,
                            best_total: state.best_total(),
                        });
                        return RunOutcome::stalled(
                            attempts,
                            state.best_total(),
                            state.history.clone(),
                            state.total_duration(),
                        );
                    }
                    state.advance();
                }
                Err(failure) => {
                    warn!(error = %failure.error, attempt = state.attempt, "Error during attempt");
                    return self.fatal(state, failure.error, failure.verdict);
                }
            }
        }
    }

    /// Run one Drafting then Scoring cycle.
    /// Returns Some(outcome) if the run should terminate, None to draft again.
    async fn run_attempt(
        &self,
        state: &mut RunState,
    ) -> Result<Option<RunOutcome>, AttemptFailure> {
        let attempt = state.attempt;

        state.set_phase(LoopPhase::Drafting);
        self.logger.log(&LogEvent::DraftStarted { attempt });
        let draft_started = Instant::now();
        let draft = self
            .writer
            .generate(
                attempt,
                &state.inputs,
                state.prior_draft(),
                state.prior_feedback(),
            )
            .await?;
        let draft_duration = draft_started.elapsed().as_secs_f64();

        self.logger.log(&LogEvent::DraftCompleted {
            attempt,
            key: draft.key.clone(),
            chars: draft.text.chars().count(),
            duration_secs: draft_duration,
        });

        state.set_phase(LoopPhase::Scoring);
        self.logger.log(&LogEvent::ScoringStarted { attempt });
        let scoring_started = Instant::now();

        let rubric = match state.rubric.take() {
            Some(rubric) => rubric,
            None => {
                let rules = state.inputs.rules.as_deref().unwrap_or_default();
                self.derive_rubric(rules).await?
            }
        };
        let scored = self.critic.score(&rubric, &draft.text, attempt).await;
        state.rubric = Some(rubric);
        let scorecard = scored?;

        let total = match self.critic.extract_total(&scorecard.text).await {
            Ok(total) => Ok(total),
            Err(CriticError::Parse(e)) => {
                warn!(attempt, error = %e, "Scorecard total could not be parsed");
                Err(e)
            }
            Err(e) => return Err(e.into()),
        };
        let parsed = total.as_ref().ok().copied();
        let verdict = Verdict::judge(parsed, self.settings.threshold);
        let scoring_duration = scoring_started.elapsed().as_secs_f64();

        self.logger.log(&LogEvent::ScoringCompleted {
            attempt,
            total: parsed,
            verdict: verdict.short_description(parsed),
            duration_secs: scoring_duration,
        });

        let record = AttemptRecord {
            attempt,
            draft_key: draft.key.clone(),
            draft_chars: draft.text.chars().count(),
            total: parsed,
            verdict,
            draft_duration_secs: draft_duration,
            scoring_duration_secs: scoring_duration,
            timestamp: Utc::now(),
        };
        if let Some(ref run_log) = self.run_log {
            run_log.write_attempt(
                attempt,
                &record.draft_key,
                record.draft_chars,
                parsed,
                &verdict.short_description(parsed),
                record.timestamp,
            );
        }
        state.push_record(record);

        let draft_key = draft.key.clone();
        state.last_draft = Some(draft);
        state.last_scorecard = Some(scorecard);

        match total {
            Err(e) => {
                state.set_phase(LoopPhase::Fatal);
                Err(AttemptFailure {
                    error: LoopError::Critic(CriticError::Parse(e)),
                    verdict: Some(Verdict::Indeterminate),
                })
            }
            Ok(total) if verdict.is_accept() => {
                state.set_phase(LoopPhase::Accepted);
                let duration = state.total_duration();
                self.logger.log(&LogEvent::RunAccepted {
                    attempts: attempt,
                    total,
                    draft_key: draft_key.clone(),
                    duration_secs: duration.as_secs_f64(),
                });
                Ok(Some(RunOutcome::accepted(
                    attempt,
                    total,
                    draft_key,
                    state.history.clone(),
                    duration,
                )))
            }
            Ok(total) => {
                state.set_phase(LoopPhase::RejectedRetry);
                info!(
                    attempt,
                    total,
                    threshold = self.settings.threshold,
                    "Below threshold, revising"
                );
                Ok(None)
            }
        }
    }

    async fn derive_rubric(&self, rules: &str) -> Result<Rubric, LoopError> {
        let rubric = self.critic.derive_rubric(rules).await?;
        self.logger.log(&LogEvent::RubricDerived {
            criteria: rubric.criteria.len(),
            max_total: rubric.max_total(),
        });
        debug!(rubric_chars = rubric.text.len(), "Rubric cached for this run");
        Ok(rubric)
    }

    fn fatal(&self, state: &mut RunState, error: LoopError, verdict: Option<Verdict>) -> RunOutcome {
        state.set_phase(LoopPhase::Fatal);
        self.logger.log(&LogEvent::ErrorEncountered {
            attempt: state.attempt,
            error: error.to_string(),
        });
        RunOutcome::fatal(
            state.attempt,
            error.kind(),
            error.to_string(),
            verdict,
            state.history.clone(),
            state.total_duration(),
        )
    }

    fn finish(&self, outcome: &RunOutcome) {
        let Some(ref run_log) = self.run_log else {
            return;
        };
        let (final_total, reason, duration) = match outcome {
            RunOutcome::Accepted {
                total,
                total_duration_secs,
                ..
            } => (Some(*total), None, *total_duration_secs),
            RunOutcome::Fatal {
                reason,
                total_duration_secs,
                ..
            } => (None, Some(reason.as_str()), *total_duration_secs),
            RunOutcome::MaxAttemptsReached {
                best_total,
                total_duration_secs,
                ..
            }
            | RunOutcome::Stalled {
                best_total,
                total_duration_secs,
                ..
            } => (*best_total, None, *total_duration_secs),
            RunOutcome::Interrupted {
                total_duration_secs,
                ..
            } => (None, None, *total_duration_secs),
        };
        run_log.write_end(
            outcome.status(),
            outcome.attempts(),
            final_total,
            reason,
            duration,
        );
    }
}
