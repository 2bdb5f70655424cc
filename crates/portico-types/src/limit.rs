use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-user out-of-context counter.
///
/// A record is never deleted; it goes stale once its window passes and a
/// future `blocked_until` supersedes the count entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRecord {
    pub user_id: String,
    pub out_of_context_count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl LimitRecord {
    /// Fresh record for a user's first out-of-scope question.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            out_of_context_count: 1,
            window_start: now,
            blocked_until: None,
        }
    }

    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        match self.blocked_until {
            Some(until) => now < until,
            None => false,
        }
    }

    /// The counting window has passed and the count no longer applies.
    pub fn window_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.window_start + window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_takes_precedence_over_count() {
        let now = Utc::now();
        let mut record = LimitRecord::new("user-1", now);
        assert!(!record.is_blocked(now));

        record.blocked_until = Some(now + Duration::hours(24));
        assert!(record.is_blocked(now));
        assert!(!record.is_blocked(now + Duration::hours(25)));
    }

    #[test]
    fn test_window_expiry_boundary() {
        let now = Utc::now();
        let record = LimitRecord::new("user-1", now);
        let window = Duration::hours(24);

        assert!(!record.window_expired(now + Duration::hours(23), window));
        // Exact boundary counts as expired.
        assert!(record.window_expired(now + window, window));
    }
}
