use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portico_guard::{
    GuardPolicy, LimitStore, MemoryAuditSink, MemoryLimitStore, OutOfContextGuard,
    QueryClassifier, Verdict,
};
use portico_types::{LimitRecord, QueryCategory};

/// Classifier returning a fixed (but settable) category, counting calls
/// so tests can assert it was never consulted.
struct ScriptedClassifier {
    category: std::sync::Mutex<QueryCategory>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn returning(category: QueryCategory) -> Self {
        Self {
            category: std::sync::Mutex::new(category),
            calls: AtomicUsize::new(0),
        }
    }

    fn set(&self, category: QueryCategory) {
        *self.category.lock().unwrap() = category;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryClassifier for ScriptedClassifier {
    async fn classify(&self, _question: &str) -> Result<QueryCategory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.category.lock().unwrap())
    }
}

struct FailingClassifier;

#[async_trait]
impl QueryClassifier for FailingClassifier {
    async fn classify(&self, _question: &str) -> Result<QueryCategory> {
        Err(anyhow!("classifier backend down"))
    }
}

/// Store whose reads always fail, for the fail-open path.
struct BrokenStore;

#[async_trait]
impl LimitStore for BrokenStore {
    async fn fetch(&self, _user_id: &str) -> Result<Option<LimitRecord>> {
        Err(anyhow!("connection refused"))
    }

    async fn record_out_of_context(
        &self,
        _user_id: &str,
        _now: DateTime<Utc>,
        _window: Duration,
    ) -> Result<LimitRecord> {
        Err(anyhow!("connection refused"))
    }

    async fn set_block(&self, _user_id: &str, _until: DateTime<Utc>) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

struct Fixture {
    guard: OutOfContextGuard,
    store: Arc<MemoryLimitStore>,
    classifier: Arc<ScriptedClassifier>,
    audit: Arc<MemoryAuditSink>,
}

fn fixture(category: QueryCategory) -> Fixture {
    let store = Arc::new(MemoryLimitStore::new());
    let classifier = Arc::new(ScriptedClassifier::returning(category));
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = OutOfContextGuard::new(
        store.clone(),
        classifier.clone(),
        audit.clone(),
        GuardPolicy::default(),
    );
    Fixture {
        guard,
        store,
        classifier,
        audit,
    }
}

#[tokio::test]
async fn test_blocked_user_is_rejected_without_classification() {
    let f = fixture(QueryCategory::Business);
    let until = Utc::now() + Duration::hours(3);
    f.store.set_block("user-1", until).await.unwrap();

    // Even an innocuous question is rejected while blocked.
    let verdict = f.guard.screen("user-1", "show my portfolio").await.unwrap();
    assert_eq!(verdict, Verdict::Blocked { until });
    assert_eq!(f.classifier.calls(), 0);

    // The rejection itself is audited.
    let entries = f.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, QueryCategory::OutOfContext);
}

#[tokio::test]
async fn test_third_out_of_scope_question_blocks() {
    let f = fixture(QueryCategory::OutOfContext);
    let before = Utc::now();

    let first = f.guard.screen("user-1", "tell me a joke").await.unwrap();
    assert_eq!(first, Verdict::OutOfScope { count: 1, remaining: 2 });

    let second = f.guard.screen("user-1", "what about football").await.unwrap();
    assert_eq!(second, Verdict::OutOfScope { count: 2, remaining: 1 });

    let third = f.guard.screen("user-1", "recipe for pasta").await.unwrap();
    let until = match third {
        Verdict::Blocked { until } => until,
        other => panic!("expected block on the third question, got {other:?}"),
    };

    // blocked_until = now + 24h, within test tolerance.
    let lower = before + Duration::hours(24);
    let upper = Utc::now() + Duration::hours(24);
    assert!(until >= lower && until <= upper);

    let record = f.store.fetch("user-1").await.unwrap().unwrap();
    assert_eq!(record.out_of_context_count, 3);
    assert_eq!(record.blocked_until, Some(until));
}

#[tokio::test]
async fn test_in_scope_question_never_touches_the_counter() {
    let f = fixture(QueryCategory::OutOfContext);
    f.guard.screen("user-1", "weather?").await.unwrap();
    f.guard.screen("user-1", "horoscope?").await.unwrap();

    f.classifier.set(QueryCategory::Business);
    let verdict = f.guard.screen("user-1", "loan share of customer X").await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Allowed {
            category: QueryCategory::Business
        }
    );

    let record = f.store.fetch("user-1").await.unwrap().unwrap();
    assert_eq!(record.out_of_context_count, 2);
}

#[tokio::test]
async fn test_expired_block_starts_a_fresh_window() {
    let f = fixture(QueryCategory::OutOfContext);
    let stale = Utc::now() - Duration::hours(25);

    // Simulate a user who was blocked yesterday.
    for _ in 0..3 {
        f.store
            .record_out_of_context("user-1", stale, Duration::hours(24))
            .await
            .unwrap();
    }
    f.store
        .set_block("user-1", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();

    // Block has lapsed: the next out-of-scope question counts as 1, not 4.
    let verdict = f.guard.screen("user-1", "movie tips").await.unwrap();
    assert_eq!(verdict, Verdict::OutOfScope { count: 1, remaining: 2 });
}

#[tokio::test]
async fn test_stale_window_resets_count() {
    let f = fixture(QueryCategory::OutOfContext);
    let stale = Utc::now() - Duration::hours(30);

    f.store
        .record_out_of_context("user-1", stale, Duration::hours(24))
        .await
        .unwrap();
    f.store
        .record_out_of_context("user-1", stale, Duration::hours(24))
        .await
        .unwrap();

    let verdict = f.guard.screen("user-1", "lottery numbers").await.unwrap();
    assert_eq!(verdict, Verdict::OutOfScope { count: 1, remaining: 2 });
}

#[tokio::test]
async fn test_store_read_failure_fails_open() {
    let classifier = Arc::new(ScriptedClassifier::returning(QueryCategory::Business));
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = OutOfContextGuard::new(
        Arc::new(BrokenStore),
        classifier.clone(),
        audit,
        GuardPolicy::default(),
    );

    let verdict = guard.screen("user-1", "portfolio summary").await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Allowed {
            category: QueryCategory::Business
        }
    );
}

#[tokio::test]
async fn test_classifier_failure_propagates() {
    let store = Arc::new(MemoryLimitStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let guard = OutOfContextGuard::new(
        store,
        Arc::new(FailingClassifier),
        audit,
        GuardPolicy::default(),
    );

    assert!(guard.screen("user-1", "anything").await.is_err());
}

#[tokio::test]
async fn test_refusals_are_audited_with_warning_text() {
    let f = fixture(QueryCategory::OutOfContext);
    f.guard.screen("user-1", "best holiday spots").await.unwrap();

    let entries = f.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].question, "best holiday spots");
    assert_eq!(entries[0].category, QueryCategory::OutOfContext);
    assert!(entries[0].answer.contains("left before access is paused"));
    assert!(!entries[0].needs_investigation);
}

#[tokio::test]
async fn test_answered_questions_can_flag_investigation() {
    let f = fixture(QueryCategory::Business);
    f.guard
        .record_answer(
            "user-1",
            "threshold for product Z",
            "",
            QueryCategory::Business,
            true,
        )
        .await;

    let entries = f.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].needs_investigation);
}
