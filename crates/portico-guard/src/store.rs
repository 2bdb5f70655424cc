use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portico_types::{FeedbackEntry, LimitRecord};
use tokio::sync::Mutex;

/// Persistence seam for per-user limit records.
///
/// `record_out_of_context` must be atomic at the storage layer: a single
/// conditional update that either increments the in-window count or
/// resets to a fresh window, never a read-modify-write in the caller.
#[async_trait]
pub trait LimitStore: Send + Sync {
    /// `Ok(None)` means no record exists; `Err` means the store itself
    /// failed (the guard fails open on that).
    async fn fetch(&self, user_id: &str) -> Result<Option<LimitRecord>>;

    /// Count one out-of-scope question and return the updated record.
    async fn record_out_of_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<LimitRecord>;

    async fn set_block(&self, user_id: &str, until: DateTime<Utc>) -> Result<()>;
}

/// Destination for the append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: FeedbackEntry) -> Result<()>;
}

/// In-memory store used by tests and local development.
#[derive(Default)]
pub struct MemoryLimitStore {
    records: Mutex<HashMap<String, LimitRecord>>,
}

impl MemoryLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LimitStore for MemoryLimitStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<LimitRecord>> {
        Ok(self.records.lock().await.get(user_id).cloned())
    }

    async fn record_out_of_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<LimitRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .and_modify(|record| {
                if record.window_expired(now, window) {
                    record.out_of_context_count = 1;
                    record.window_start = now;
                } else {
                    record.out_of_context_count += 1;
                }
            })
            .or_insert_with(|| LimitRecord::new(user_id, now));
        Ok(record.clone())
    }

    async fn set_block(&self, user_id: &str, until: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| LimitRecord::new(user_id, until));
        record.blocked_until = Some(until);
        Ok(())
    }
}

/// In-memory audit sink; exposes the recorded entries for assertions.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<FeedbackEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<FeedbackEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: FeedbackEntry) -> Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
