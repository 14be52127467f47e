use letterloop_critic::Verdict;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AttemptRecord, ErrorKind};

/// The final outcome of a refinement run
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A draft met the threshold
    Accepted {
        attempts: usize,
        total: u32,
        draft_key: String,
        #[serde(skip)]
        history: Vec<AttemptRecord>,
        total_duration_secs: f64,
    },
    /// The first unrecoverable failure stopped the run
    Fatal {
        attempts: usize,
        kind: ErrorKind,
        reason: String,
        verdict: Option<Verdict>,
        #[serde(skip)]
        history: Vec<AttemptRecord>,
        total_duration_secs: f64,
    },
    /// Hit the configured attempt ceiling
    MaxAttemptsReached {
        attempts: usize,
        best_total: Option<u32>,
        #[serde(skip)]
        history: Vec<AttemptRecord>,
        total_duration_secs: f64,
    },
    /// The total stopped improving
    Stalled {
        attempts: usize,
        best_total: Option<u32>,
        #[serde(skip)]
        history: Vec<AttemptRecord>,
        total_duration_secs: f64,
    },
    /// User requested stop (e.g., Ctrl+C)
    Interrupted {
        attempts: usize,
        #[serde(skip)]
        history: Vec<AttemptRecord>,
        total_duration_secs: f64,
    },
}

impl RunOutcome {
    pub fn accepted(
        attempts: usize,
        total: u32,
        draft_key: String,
        history: Vec<AttemptRecord>,
        duration: Duration,
    ) -> Self {
        Self::Accepted {
            attempts,
            total,
            draft_key,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn fatal(
        attempts: usize,
        kind: ErrorKind,
        reason: String,
        verdict: Option<Verdict>,
        history: Vec<AttemptRecord>,
        duration: Duration,
    ) -> Self {
        Self::Fatal {
            attempts,
            kind,
            reason,
            verdict,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn max_attempts_reached(
        attempts: usize,
        best_total: Option<u32>,
        history: Vec<AttemptRecord>,
        duration: Duration,
    ) -> Self {
        Self::MaxAttemptsReached {
            attempts,
            best_total,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn stalled(
        attempts: usize,
        best_total: Option<u32>,
        history: Vec<AttemptRecord>,
        duration: Duration,
    ) -> Self {
        Self::Stalled {
            attempts,
            best_total,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn interrupted(attempts: usize, history: Vec<AttemptRecord>, duration: Duration) -> Self {
        Self::Interrupted {
            attempts,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            Self::Accepted { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::MaxAttemptsReached { attempts, .. }
            | Self::Stalled { attempts, .. }
            | Self::Interrupted { attempts, .. } => *attempts,
        }
    }

    pub fn history(&self) -> &[AttemptRecord] {
        match self {
            Self::Accepted { history, .. }
            | Self::Fatal { history, .. }
            | Self::MaxAttemptsReached { history, .. }
            | Self::Stalled { history, .. }
            | Self::Interrupted { history, .. } => history,
        }
    }

    /// Short status name, as used in run transcripts
    pub fn status(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Fatal { .. } => "fatal",
            Self::MaxAttemptsReached { .. } => "max_attempts_reached",
            Self::Stalled { .. } => "stalled",
            Self::Interrupted { .. } => "interrupted",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Accepted { .. } => 0,
            Self::MaxAttemptsReached { .. } | Self::Stalled { .. } => 1,
            Self::Interrupted { .. } => 130,
            Self::Fatal { .. } => 2,
        }
    }
}
