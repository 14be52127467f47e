use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shape of the rubric: how many criteria and what each is worth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricSpec {
    pub criteria: usize,
    pub weight: u32,
}

impl Default for RubricSpec {
    fn default() -> Self {
        Self {
            criteria: 20,
            weight: 5,
        }
    }
}

impl RubricSpec {
    pub fn max_total(&self) -> u32 {
        self.weight.saturating_mul(self.criteria as u32)
    }
}

/// Scoring criteria derived once per run from the rules document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rubric {
    /// Model output exactly as received; this is what the scorer sees
    pub text: String,
    /// Criteria recognised in `text`, in order
    pub criteria: Vec<String>,
    pub spec: RubricSpec,
}

impl Rubric {
    pub fn from_text(text: impl Into<String>, spec: RubricSpec) -> Self {
        let text = text.into();
        let criteria = parse_criteria(&text);
        if criteria.len() != spec.criteria {
            warn!(
                expected = spec.criteria,
                found = criteria.len(),
                "Rubric criteria count differs from requested"
            );
        }
        Self {
            text,
            criteria,
            spec,
        }
    }

    pub fn max_total(&self) -> u32 {
        self.spec.max_total()
    }
}

/// Pull list items out of a numbered or bulleted list.
///
/// Lines that are not list items (headings, prose) are skipped.
pub fn parse_criteria(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(list_item)
        .map(|item| item.trim_matches('*').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn list_item(line: &str) -> Option<&str> {
    let line = line.trim();

    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest);
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim_start)
}
