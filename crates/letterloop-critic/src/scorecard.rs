use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RubricSpec;

/// Critique of one draft: one block per rubric criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    pub attempt: usize,
    pub text: String,
}

/// How the total score is derived from a scorecard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalStrategy {
    /// Ask the lite model for the sum, then keep only its digits
    #[default]
    Model,
    /// Add up the `Score: x/W` lines locally; no extra network call
    Local,
}

impl std::fmt::Display for TotalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TotalStrategy::Model => write!(f, "model"),
            TotalStrategy::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for TotalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" => Ok(TotalStrategy::Model),
            "local" => Ok(TotalStrategy::Local),
            _ => Err(format!("Unknown total strategy: {}", s)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotalParseError {
    #[error("no digits in response: {0:?}")]
    NoDigits(String),

    #[error("not a valid integer: {0:?}")]
    NotANumber(String),

    #[error("total {value} exceeds the maximum of {max}")]
    OutOfRange { value: u32, max: u32 },

    #[error("expected {expected} criterion scores, found {found}")]
    CriterionCount { expected: usize, found: usize },

    #[error("criterion score {value} exceeds the weight of {weight}")]
    CriterionOutOfRange { value: u32, weight: u32 },
}

/// Extract an integer total from a model response by dropping every
/// non-digit character.
///
/// `"총점: 87점"` parses as 87. A response with no digits at all, or whose
/// digits exceed `max_total`, is a parse failure.
pub fn parse_total(response: &str, max_total: u32) -> Result<u32, TotalParseError> {
    let digits: String = response.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(TotalParseError::NoDigits(response.to_string()));
    }

    let value: u32 = digits
        .parse()
        .map_err(|_| TotalParseError::NotANumber(digits.clone()))?;

    if value > max_total {
        return Err(TotalParseError::OutOfRange {
            value,
            max: max_total,
        });
    }
    Ok(value)
}

/// Sum the per-criterion `Score: x/W` lines of a scorecard.
///
/// Requires exactly one score per criterion, each within the weight.
pub fn sum_criterion_scores(scorecard: &str, spec: &RubricSpec) -> Result<u32, TotalParseError> {
    let scores: Vec<u32> = scorecard.lines().filter_map(criterion_score).collect();

    if scores.len() != spec.criteria {
        return Err(TotalParseError::CriterionCount {
            expected: spec.criteria,
            found: scores.len(),
        });
    }

    if let Some(&value) = scores.iter().find(|&&s| s > spec.weight) {
        return Err(TotalParseError::CriterionOutOfRange {
            value,
            weight: spec.weight,
        });
    }

    Ok(scores.iter().sum())
}

fn criterion_score(line: &str) -> Option<u32> {
    let line = line
        .trim()
        .trim_start_matches(['-', '*', '|', ' '])
        .to_ascii_lowercase();
    let rest = line.strip_prefix("score")?;
    let rest = rest.trim_start_matches('*').trim_start();
    let rest = rest.strip_prefix(':')?.trim_start_matches(['*', ' ']);

    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
