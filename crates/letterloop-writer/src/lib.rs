//! Generator side of letterloop: the cover letter writer and the analyzers
//! that prepare its inputs.

mod analyzers;
mod error;
mod inputs;
mod prompts;
mod writer;

pub use analyzers::{AnalysisKind, Analyzer};
pub use error::WriterError;
pub use inputs::{WriterInputs, DEFAULT_RULES};
pub use prompts::{AnalyzerPrompts, WriterPrompts};
pub use writer::{CoverLetterWriter, Draft};
