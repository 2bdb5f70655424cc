use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use portico_session::error::Result;
use portico_session::{AuthBackend, AuthStateChange, SessionError, SessionEvent, SessionValidator};
use portico_types::SessionLease;
use tokio::sync::mpsc;

fn lease(expires_in_secs: i64) -> SessionLease {
    let now = Utc::now();
    SessionLease {
        user_id: "svc-account".into(),
        issued_at: now - Duration::minutes(30),
        expires_at: now + Duration::seconds(expires_in_secs),
        refresh_token: "refresh-1".into(),
    }
}

/// Backend with a fixed script: what fetch returns, whether refresh
/// succeeds, and call counters to assert invocation counts.
struct ScriptedBackend {
    session: Option<SessionLease>,
    fetch_fails: bool,
    refresh_result: Option<SessionLease>,
    fetch_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn returning(session: Option<SessionLease>) -> Self {
        Self {
            session,
            fetch_fails: false,
            refresh_result: None,
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            session: None,
            fetch_fails: true,
            refresh_result: None,
            fetch_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    fn with_refresh(mut self, renewed: SessionLease) -> Self {
        self.refresh_result = Some(renewed);
        self
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn fetch_session(&self) -> Result<Option<SessionLease>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fetch_fails {
            return Err(SessionError::Backend("backend unreachable".into()));
        }
        Ok(self.session.clone())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<SessionLease> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result
            .clone()
            .ok_or_else(|| SessionError::Rejected { status: 400 })
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }
}

fn validator_with(
    backend: ScriptedBackend,
) -> (
    Arc<SessionValidator>,
    Arc<ScriptedBackend>,
    mpsc::Receiver<SessionEvent>,
) {
    let backend = Arc::new(backend);
    let (tx, rx) = mpsc::channel(8);
    let validator = Arc::new(SessionValidator::new(backend.clone(), tx));
    (validator, backend, rx)
}

#[tokio::test]
async fn test_never_authenticated_is_a_noop() {
    let (validator, backend, mut rx) = validator_with(ScriptedBackend::failing());

    assert!(validator.validate().await);
    assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_lapsed_lease_expires_and_returns_false() {
    let (validator, _backend, mut rx) = validator_with(ScriptedBackend::returning(Some(lease(-1))));
    validator.mark_signed_in(lease(-1)).await;

    assert!(!validator.validate().await);
    assert_eq!(rx.recv().await, Some(SessionEvent::Expired));
    assert!(validator.current_lease().await.is_none());
}

#[tokio::test]
async fn test_fetch_error_expires_when_previously_authenticated() {
    let (validator, _backend, mut rx) = validator_with(ScriptedBackend::failing());
    validator.mark_signed_in(lease(3600)).await;

    assert!(!validator.validate().await);
    assert_eq!(rx.recv().await, Some(SessionEvent::Expired));
}

#[tokio::test]
async fn test_missing_session_expires() {
    let (validator, _backend, mut rx) = validator_with(ScriptedBackend::returning(None));
    validator.mark_signed_in(lease(3600)).await;

    assert!(!validator.validate().await);
    assert_eq!(rx.recv().await, Some(SessionEvent::Expired));
}

#[tokio::test]
async fn test_near_expiry_refreshes_exactly_once() {
    let backend = ScriptedBackend::returning(Some(lease(120))).with_refresh(lease(3600));
    let (validator, backend, mut rx) = validator_with(backend);
    validator.mark_signed_in(lease(120)).await;

    assert!(validator.validate().await);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rx.recv().await, Some(SessionEvent::Refreshed));

    let stored = validator.current_lease().await.unwrap();
    assert!(stored.seconds_to_expiry(Utc::now()) > 3000);
}

#[tokio::test]
async fn test_refresh_failure_warns_but_session_stays_usable() {
    let backend = ScriptedBackend::returning(Some(lease(120)));
    let (validator, backend, mut rx) = validator_with(backend);
    validator.mark_signed_in(lease(120)).await;

    assert!(validator.validate().await);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        rx.recv().await,
        Some(SessionEvent::RefreshFailed { .. })
    ));
    // Not forced out: the old lease is still held.
    assert!(validator.current_lease().await.is_some());
}

#[tokio::test]
async fn test_healthy_lease_has_no_side_effects() {
    let (validator, backend, mut rx) = validator_with(ScriptedBackend::returning(Some(lease(3600))));
    validator.mark_signed_in(lease(3600)).await;

    assert!(validator.validate().await);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_signed_out_event_requires_prior_authentication() {
    let (validator, _backend, mut rx) = validator_with(ScriptedBackend::returning(None));

    validator.handle_auth_change(AuthStateChange::SignedOut).await;
    assert!(rx.try_recv().is_err());

    validator.mark_signed_in(lease(3600)).await;
    validator.handle_auth_change(AuthStateChange::SignedOut).await;
    assert_eq!(rx.recv().await, Some(SessionEvent::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_runs_and_shuts_down() {
    let (validator, backend, _rx) = validator_with(ScriptedBackend::returning(Some(lease(3600))));
    validator.mark_signed_in(lease(3600)).await;

    let handle = validator.spawn();

    // Paused time auto-advances past the initial delay and a few ticks.
    tokio::time::sleep(std::time::Duration::from_secs(65)).await;
    handle.shutdown().await;

    let checks = backend.fetch_calls.load(Ordering::SeqCst);
    assert!(checks >= 2, "expected initial check plus interval ticks, got {checks}");
}
