use serde::{Deserialize, Serialize};

/// Classification assigned to each assistant question.
///
/// `Business` and `Technical` are in scope for the portfolio assistant;
/// `OutOfContext` questions count against the per-user limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    Business,
    Technical,
    OutOfContext,
}

impl QueryCategory {
    pub fn is_in_scope(&self) -> bool {
        !matches!(self, Self::OutOfContext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Technical => "technical",
            Self::OutOfContext => "out_of_context",
        }
    }

    /// Parse a classifier label, tolerating whitespace and casing.
    ///
    /// Returns `None` for anything that is not one of the three known
    /// labels so the caller decides how to treat a confused classifier.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "business" => Some(Self::Business),
            "technical" => Some(Self::Technical),
            "out_of_context" => Some(Self::OutOfContext),
            _ => None,
        }
    }
}
