use crate::RubricSpec;

/// Prompt templates for the critic.
///
/// The scoring format requested here is what [`crate::sum_criterion_scores`]
/// and the total-extraction call read back; change them together.
pub struct CriticPrompts;

impl CriticPrompts {
    pub const RUBRIC_SYSTEM: &'static str =
        "You are a strict member of a corporate hiring committee. Output only the list of evaluation criteria.";

    pub const SCORING_SYSTEM: &'static str =
        "You are a highly conservative recruiting expert. Output only the scorecard.";

    pub const TOTAL_SYSTEM: &'static str =
        "You are a conservative recruiting expert. Read the scorecard and state only the total score.";

    /// Ask for exactly `spec.criteria` criteria derived from the rules
    pub fn build_rubric_prompt(rules: &str, spec: &RubricSpec) -> String {
        format!(
            r#"Using the writing rules below, derive exactly {count} concrete criteria for grading a cover letter.
Return them as a numbered list, one criterion per line.
Each criterion is worth {weight} points (total {max} points).

[Writing rules]
{rules}"#,
            count = spec.criteria,
            weight = spec.weight,
            max = spec.max_total(),
            rules = rules.trim(),
        )
    }

    /// Ask for a per-criterion scorecard of `draft`
    pub fn build_scoring_prompt(rubric: &str, draft: &str, spec: &RubricSpec) -> String {
        format!(
            r#"[Evaluation criteria]
{rubric}

[Cover letter]
{draft}

Grade the cover letter very strictly against the {count} criteria above.
Each criterion is worth at most {weight} points.
For every criterion, in order, write exactly this block:

### <number>. <criterion>
- Note: <what you observed>
- Justification: <why the score was given>
- Score: <points>/{weight}

Write nothing other than the scorecard."#,
            rubric = rubric.trim(),
            draft = draft.trim(),
            count = spec.criteria,
            weight = spec.weight,
        )
    }

    /// Ask the lite model for the integer sum of a scorecard
    pub fn build_total_prompt(scorecard: &str) -> String {
        format!(
            r#"[Scorecard]
{scorecard}

Compute the total score of this scorecard.
Output only the total as an integer and nothing else."#,
            scorecard = scorecard.trim(),
        )
    }
}
