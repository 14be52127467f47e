//! # letterloop-core
//!
//! Orchestration for letterloop: the analysis pipeline that prepares the
//! writer's inputs and the loop that alternates drafting and grading until a
//! draft clears the acceptance threshold.
//!
//! ## Key Types
//!
//! - [`LoopRunner`] - Drafting/Scoring state machine
//! - [`RunState`] - Attempt counter, last draft and scorecard, cached rubric
//! - [`RunOutcome`] - Terminal result with an exit code
//! - [`AnalysisPipeline`] - Company, applicant and project analysis

mod context;
mod error;
mod loop_runner;
mod outcome;
mod pipeline;

pub use context::{AttemptRecord, LoopPhase, LoopSettings, RunState, DEFAULT_THRESHOLD};
pub use error::{ErrorKind, LoopError};
pub use loop_runner::LoopRunner;
pub use outcome::RunOutcome;
pub use pipeline::{AnalysisPipeline, AnalysisReport, AnalysisSources};
