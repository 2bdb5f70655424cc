use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use portico_types::{FeedbackEntry, QueryCategory};

use crate::classifier::QueryClassifier;
use crate::store::{AuditSink, LimitStore};

/// Thresholds for the out-of-context limiter.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    /// Out-of-scope questions allowed per window before blocking.
    pub max_out_of_context: u32,
    /// Rolling window bounding the count.
    pub window: Duration,
    /// How long a block lasts once imposed.
    pub block: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_out_of_context: 3,
            window: Duration::hours(24),
            block: Duration::hours(24),
        }
    }
}

/// Outcome of screening one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// In scope; the caller should answer it.
    Allowed { category: QueryCategory },

    /// Out of scope but under the limit; refused with a warning.
    OutOfScope { count: u32, remaining: u32 },

    /// The user is suspended until the given time.
    Blocked { until: DateTime<Utc> },
}

impl Verdict {
    /// Message to surface for refused questions; `None` when allowed.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Allowed { .. } => None,
            Self::OutOfScope { remaining, .. } => Some(format!(
                "{} You have {} such question(s) left before access is paused.",
                REFUSAL_MESSAGE, remaining
            )),
            Self::Blocked { until } => Some(block_message(*until)),
        }
    }
}

const REFUSAL_MESSAGE: &str =
    "I can only help with corporate-banking portfolio questions and this application.";

fn block_message(until: DateTime<Utc>) -> String {
    format!(
        "Assistant access is paused until {} after repeated unrelated questions.",
        until.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Screens every assistant question: immediate rejection while blocked,
/// classification otherwise, and the counter state machine for
/// out-of-scope questions. Every refusal lands in the audit trail.
pub struct OutOfContextGuard {
    store: Arc<dyn LimitStore>,
    classifier: Arc<dyn QueryClassifier>,
    audit: Arc<dyn AuditSink>,
    policy: GuardPolicy,
}

impl OutOfContextGuard {
    pub fn new(
        store: Arc<dyn LimitStore>,
        classifier: Arc<dyn QueryClassifier>,
        audit: Arc<dyn AuditSink>,
        policy: GuardPolicy,
    ) -> Self {
        Self {
            store,
            classifier,
            audit,
            policy,
        }
    }

    pub async fn screen(&self, user_id: &str, question: &str) -> Result<Verdict> {
        let now = Utc::now();

        let record = match self.store.fetch(user_id).await {
            Ok(record) => record,
            Err(e) => {
                // Fail open: an infrastructure hiccup must not lock out a
                // legitimate user.
                tracing::warn!(
                    error = %e,
                    user_id,
                    "limit store unavailable, treating user as clear"
                );
                None
            }
        };

        if let Some(until) = record.as_ref().and_then(|r| r.blocked_until) {
            if now < until {
                // The classifier is never consulted for blocked users.
                self.record_refusal(user_id, question, &block_message(until))
                    .await;
                return Ok(Verdict::Blocked { until });
            }
        }

        let category = self
            .classifier
            .classify(question)
            .await
            .context("question classification failed")?;

        if category.is_in_scope() {
            return Ok(Verdict::Allowed { category });
        }

        let updated = self
            .store
            .record_out_of_context(user_id, now, self.policy.window)
            .await
            .context("failed to count out-of-context question")?;

        if updated.out_of_context_count >= self.policy.max_out_of_context {
            let until = now + self.policy.block;
            self.store
                .set_block(user_id, until)
                .await
                .context("failed to persist block")?;
            tracing::info!(
                user_id,
                %until,
                count = updated.out_of_context_count,
                "user blocked after repeated out-of-context questions"
            );
            self.record_refusal(user_id, question, &block_message(until))
                .await;
            return Ok(Verdict::Blocked { until });
        }

        let verdict = Verdict::OutOfScope {
            count: updated.out_of_context_count,
            remaining: self.policy.max_out_of_context - updated.out_of_context_count,
        };
        if let Some(message) = verdict.user_message() {
            self.record_refusal(user_id, question, &message).await;
        }
        Ok(verdict)
    }

    /// Audit an answered question. `needs_investigation` marks answers
    /// that could not be produced from the documentation.
    pub async fn record_answer(
        &self,
        user_id: &str,
        question: &str,
        answer: &str,
        category: QueryCategory,
        needs_investigation: bool,
    ) {
        self.append_audit(FeedbackEntry::new(
            user_id,
            question,
            answer,
            category,
            needs_investigation,
        ))
        .await;
    }

    async fn record_refusal(&self, user_id: &str, question: &str, message: &str) {
        self.append_audit(FeedbackEntry::new(
            user_id,
            question,
            message,
            QueryCategory::OutOfContext,
            false,
        ))
        .await;
    }

    async fn append_audit(&self, entry: FeedbackEntry) {
        // The review trail is best-effort; losing an entry must not fail
        // the request.
        if let Err(e) = self.audit.append(entry).await {
            tracing::warn!(error = %e, "audit append failed");
        }
    }
}
