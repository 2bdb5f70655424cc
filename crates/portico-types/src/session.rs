use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated credential lease issued by the managed auth backend.
///
/// A lease is either valid (`now < expires_at`) or expired; there is no
/// partial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLease {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

impl SessionLease {
    /// Build a lease from the wire representation, where timestamps are
    /// epoch seconds.
    pub fn from_epoch(
        user_id: impl Into<String>,
        issued_at: i64,
        expires_at: i64,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            issued_at: Utc.timestamp_opt(issued_at, 0).single().unwrap_or_default(),
            expires_at: Utc.timestamp_opt(expires_at, 0).single().unwrap_or_default(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Signed seconds until expiry; negative once the lease has lapsed.
    pub fn seconds_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_arithmetic() {
        let now = Utc::now();
        let lease = SessionLease {
            user_id: "svc".into(),
            issued_at: now - Duration::minutes(10),
            expires_at: now + Duration::seconds(120),
            refresh_token: "rt".into(),
        };

        assert!(!lease.is_expired(now));
        assert_eq!(lease.seconds_to_expiry(now), 120);
        assert!(lease.is_expired(now + Duration::seconds(121)));
        assert!(lease.seconds_to_expiry(now + Duration::seconds(180)) < 0);
    }

    #[test]
    fn test_from_epoch() {
        let lease = SessionLease::from_epoch("u1", 1_700_000_000, 1_700_003_600, "rt");
        assert_eq!((lease.expires_at - lease.issued_at).num_seconds(), 3600);
    }
}
