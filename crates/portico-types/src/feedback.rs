use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::QueryCategory;

/// Append-only audit record written for every assistant answer and for
/// every rejected out-of-scope question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub category: QueryCategory,
    /// Set when no answer could be produced from the documentation.
    pub needs_investigation: bool,
    pub created_at: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn new(
        user_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        category: QueryCategory,
        needs_investigation: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            question: question.into(),
            answer: answer.into(),
            category,
            needs_investigation,
            created_at: Utc::now(),
        }
    }
}
