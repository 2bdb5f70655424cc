use bson::oid::ObjectId;
use portico_types::{FeedbackEntry, LimitRecord, QueryCategory};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user limit record as stored in the `assistant_limits` collection.
///
/// Timestamps are BSON datetimes so window filters compare correctly
/// server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub out_of_context_count: u32,
    pub window_start: bson::DateTime,
    pub blocked_until: Option<bson::DateTime>,
}

impl LimitDocument {
    pub fn into_record(self) -> LimitRecord {
        LimitRecord {
            user_id: self.user_id,
            out_of_context_count: self.out_of_context_count,
            window_start: self.window_start.to_chrono(),
            blocked_until: self.blocked_until.map(|dt| dt.to_chrono()),
        }
    }
}

/// Audit row in the `assistant_feedback` collection. Append-only: no
/// update or delete path exists anywhere in this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub entry_id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub category: QueryCategory,
    pub needs_investigation: bool,
    pub created_at: bson::DateTime,
}

impl FeedbackDocument {
    pub fn from_entry(entry: FeedbackEntry) -> Self {
        Self {
            id: None,
            entry_id: entry.id,
            user_id: entry.user_id,
            question: entry.question,
            answer: entry.answer,
            category: entry.category,
            needs_investigation: entry.needs_investigation,
            created_at: bson::DateTime::from_chrono(entry.created_at),
        }
    }

    pub fn into_entry(self) -> FeedbackEntry {
        FeedbackEntry {
            id: self.entry_id,
            user_id: self.user_id,
            question: self.question,
            answer: self.answer,
            category: self.category,
            needs_investigation: self.needs_investigation,
            created_at: self.created_at.to_chrono(),
        }
    }
}
