use chrono::{DateTime, Utc};
use letterloop_critic::{Rubric, RubricSpec, Scorecard, Verdict};
use letterloop_writer::{Draft, WriterInputs};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Acceptance threshold used when none is configured
pub const DEFAULT_THRESHOLD: u32 = 90;

/// Knobs for the refinement loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Minimum total for ACCEPT
    pub threshold: u32,
    /// Attempt ceiling (None = open-ended)
    pub max_attempts: Option<usize>,
    /// Stop after this many consecutive attempts without a better total
    pub stall_limit: Option<usize>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_attempts: None,
            stall_limit: None,
        }
    }
}

impl LoopSettings {
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = Some(max);
        self
    }

    pub fn with_stall_limit(mut self, limit: usize) -> Self {
        self.stall_limit = Some(limit);
        self
    }

    /// Reject settings no scorecard under `spec` could ever satisfy
    pub fn check_against(&self, spec: &RubricSpec) -> Result<(), String> {
        if spec.criteria == 0 || spec.weight == 0 {
            return Err(format!(
                "Rubric needs at least one criterion and a positive weight (criteria = {}, weight = {})",
                spec.criteria, spec.weight
            ));
        }
        let max_total = spec.max_total();
        if self.threshold > max_total {
            return Err(format!(
                "Threshold {} exceeds the rubric maximum of {} ({} criteria x {} points)",
                self.threshold, max_total, spec.criteria, spec.weight
            ));
        }
        Ok(())
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Drafting,
    Scoring,
    Accepted,
    RejectedRetry,
    Fatal,
}

/// Record of a single draft-and-grade cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: usize,
    pub draft_key: String,
    pub draft_chars: usize,
    pub total: Option<u32>,
    pub verdict: Verdict,
    pub draft_duration_secs: f64,
    pub scoring_duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one run, owned by the loop runner
#[derive(Debug, Clone)]
pub struct RunState {
    pub inputs: WriterInputs,
    /// Current attempt number (1-indexed)
    pub attempt: usize,
    phase: LoopPhase,
    pub last_draft: Option<Draft>,
    pub last_scorecard: Option<Scorecard>,
    /// Derived on the first scoring step and reused afterwards
    pub rubric: Option<Rubric>,
    pub history: Vec<AttemptRecord>,
    best_total: Option<u32>,
    attempts_without_improvement: usize,
    started_at: Instant,
}

impl RunState {
    pub fn new(inputs: WriterInputs) -> Self {
        Self {
            inputs,
            attempt: 1,
            phase: LoopPhase::Drafting,
            last_draft: None,
            last_scorecard: None,
            rubric: None,
            history: Vec::new(),
            best_total: None,
            attempts_without_improvement: 0,
            started_at: Instant::now(),
        }
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: LoopPhase) {
        if self.phase != phase {
            tracing::debug!(attempt = self.attempt, from = ?self.phase, to = ?phase, "Phase transition");
            self.phase = phase;
        }
    }

    /// Completed cycles so far
    pub fn attempts_completed(&self) -> usize {
        self.history.len()
    }

    pub fn push_record(&mut self, record: AttemptRecord) {
        if let Some(total) = record.total {
            if self.best_total.map_or(true, |best| total > best) {
                self.best_total = Some(total);
                self.attempts_without_improvement = 0;
            } else {
                self.attempts_without_improvement += 1;
            }
        }
        self.history.push(record);
    }

    pub fn best_total(&self) -> Option<u32> {
        self.best_total
    }

    pub fn last_total(&self) -> Option<u32> {
        self.history.last().and_then(|r| r.total)
    }

    pub fn prior_draft(&self) -> Option<&str> {
        self.last_draft.as_ref().map(|d| d.text.as_str())
    }

    pub fn prior_feedback(&self) -> Option<&str> {
        self.last_scorecard.as_ref().map(|s| s.text.as_str())
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// False once the attempt ceiling has been passed
    pub fn within_limit(&self, settings: &LoopSettings) -> bool {
        match settings.max_attempts {
            Some(max) => self.attempt <= max,
            None => true,
        }
    }

    pub fn is_stalled(&self, settings: &LoopSettings) -> bool {
        match settings.stall_limit {
            Some(limit) => limit > 0 && self.attempts_without_improvement >= limit,
            None => false,
        }
    }
}
