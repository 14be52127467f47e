use crate::{AnalysisKind, WriterInputs};

/// Prompt templates for the cover letter writer
pub struct WriterPrompts;

impl WriterPrompts {
    pub const SYSTEM: &'static str = "You are a top career consultant for large enterprises. \
Fuse the supplied source material so that the applicant's experience fits the company's \
ideal candidate profile and the role's required competencies.";

    const SECTIONS: &'static str = r#"Write the following four sections.
Each section needs a compelling subheading. Cite concrete figures or technologies to build credibility.

1. Motivation: connect the company's recent direction with the applicant's career goals.
2. Role-relevant skills and experience: draw on the project details and focus on results.
3. Background: explain how the applicant's values will benefit the role.
4. Strengths and weaknesses: maximise the strengths; show how each weakness is being addressed without affecting the work.

Output only the cover letter."#;

    /// Prompt for the first draft of a run
    pub fn build_draft_prompt(inputs: &WriterInputs) -> String {
        format!(
            "Write a cover letter from the source material below.\n\
             Everything must strictly follow the writing guidelines.\n\n\
             {sources}\n\n---\n\n{sections}",
            sources = Self::sources(inputs),
            sections = Self::SECTIONS,
        )
    }

    /// Prompt for attempt > 1: the previous draft and its scorecard are
    /// embedded verbatim.
    pub fn build_revision_prompt(
        inputs: &WriterInputs,
        prior_draft: &str,
        prior_feedback: &str,
    ) -> String {
        format!(
            "Revise the cover letter below using the source material and the reviewer's scorecard.\n\
             Everything must strictly follow the writing guidelines.\n\n\
             {sources}\n\n\
             [Previous draft]\n{prior_draft}\n\n\
             [Reviewer scorecard]\n{prior_feedback}\n\n---\n\n\
             Address every criterion that did not receive full marks. \
             Keep what scored well.\n\n{sections}",
            sources = Self::sources(inputs),
            sections = Self::SECTIONS,
        )
    }

    fn sources(inputs: &WriterInputs) -> String {
        let mut out = format!(
            "[Source: company analysis]\n{}\n\n[Source: applicant profile]\n{}",
            inputs.company(),
            inputs.applicant()
        );
        if let Some(project) = inputs.project() {
            out.push_str("\n\n[Source: project details]\n");
            out.push_str(project);
        }
        out.push_str("\n\n[Writing guidelines]\n");
        out.push_str(inputs.rules_or_default());
        out
    }
}

/// Prompt templates for the upstream analyzers
pub struct AnalyzerPrompts;

impl AnalyzerPrompts {
    pub fn system(kind: AnalysisKind) -> &'static str {
        match kind {
            AnalysisKind::Company => {
                "You are a professional recruiting consultant. Analyse the job posting and summarise it under: \
                 1. Company name and industry 2. Main duties 3. Requirements 4. Preferred qualifications \
                 5. Technology stack 6. Company culture 7. Strategic tips"
            }
            AnalysisKind::Applicant => {
                "You are a senior recruiter. Analyse the resume and summarise it under: \
                 1. Education 2. Work experience 3. Core skills 4. Certifications and awards \
                 5. Career goals 6. Distinctive strengths"
            }
            AnalysisKind::Project => {
                "You are a technical interviewer. Analyse the portfolio project by project. Each project must cover: \
                 1. Project name 2. Overview and goals 3. Technologies used 4. Problem-solving process \
                 5. Results and achievements"
            }
        }
    }

    pub fn build_prompt(kind: AnalysisKind, source: &str) -> String {
        let request = match kind {
            AnalysisKind::Company => "Analyse the following job posting:",
            AnalysisKind::Applicant => "Analyse the following resume:",
            AnalysisKind::Project => "Write a project analysis report for the following portfolio:",
        };
        format!("{request}\n\n{}", source.trim())
    }
}
