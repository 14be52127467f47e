use serde::{Deserialize, Serialize};

/// Classification of a scorecard against the acceptance threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Total reached the threshold; stop the loop
    Accept,
    /// Total is below the threshold; draft again with feedback
    Revise,
    /// No total could be extracted from the scorecard
    Indeterminate,
}

impl Verdict {
    /// Judge an extracted total. `None` means extraction failed.
    pub fn judge(total: Option<u32>, threshold: u32) -> Self {
        match total {
            Some(total) if total >= threshold => Verdict::Accept,
            Some(_) => Verdict::Revise,
            None => Verdict::Indeterminate,
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn is_revise(&self) -> bool {
        matches!(self, Verdict::Revise)
    }

    /// Short description for logging
    pub fn short_description(&self, total: Option<u32>) -> String {
        match (self, total) {
            (Verdict::Accept, Some(total)) => format!("ACCEPT ({} points)", total),
            (Verdict::Revise, Some(total)) => format!("REVISE ({} points)", total),
            (Verdict::Indeterminate, _) => "INDETERMINATE".to_string(),
            (verdict, None) => verdict.to_string(),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Accept => write!(f, "ACCEPT"),
            Verdict::Revise => write!(f, "REVISE"),
            Verdict::Indeterminate => write!(f, "INDETERMINATE"),
        }
    }
}
