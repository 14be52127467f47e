mod evaluator;
mod prompts;
mod rubric;
mod scorecard;
mod verdict;

pub use evaluator::{Critic, CriticError};
pub use prompts::CriticPrompts;
pub use rubric::{parse_criteria, Rubric, RubricSpec};
pub use scorecard::{parse_total, sum_criterion_scores, Scorecard, TotalParseError, TotalStrategy};
pub use verdict::Verdict;
