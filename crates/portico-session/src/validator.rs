use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use portico_types::SessionLease;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::backend::AuthBackend;

/// Leases expiring within this many seconds get one proactive refresh.
pub const REFRESH_WINDOW_SECS: i64 = 300;

/// Cadence of the background check.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Delay before the first check after the watchdog starts.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// What the validator observed about the lease. The consumer maps these
/// onto user-facing surfaces (a blocking expiry dialog, a warning toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Terminal: the lease is gone or lapsed. Emitted only when the
    /// process had previously been authenticated.
    Expired,

    /// A proactive refresh replaced the stored lease. Informational.
    Refreshed,

    /// Proactive refresh failed; the old lease may still be briefly
    /// valid, so the session stays usable.
    RefreshFailed { reason: String },
}

/// Auth-state notifications pushed by the backend, mirrored into the
/// validator so reactive sign-outs take the same path as polled expiry.
#[derive(Debug, Clone)]
pub enum AuthStateChange {
    SignedIn(SessionLease),
    SignedOut,
}

/// Keeps the process's belief about its session consistent with the
/// backend's token lifetime.
///
/// `validate` is not side-effect free: it may replace the stored lease
/// and emit events. Overlapping runs are not guarded against; a check is
/// an idempotent read plus at most one refresh, and the interval is far
/// larger than one check's latency.
pub struct SessionValidator {
    backend: Arc<dyn AuthBackend>,
    events: mpsc::Sender<SessionEvent>,
    current: Mutex<Option<SessionLease>>,
    was_authenticated: AtomicBool,
}

impl SessionValidator {
    pub fn new(backend: Arc<dyn AuthBackend>, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            backend,
            events,
            current: Mutex::new(None),
            was_authenticated: AtomicBool::new(false),
        }
    }

    /// Install a lease obtained at sign-in; enables expiry signaling.
    pub async fn mark_signed_in(&self, lease: SessionLease) {
        *self.current.lock().await = Some(lease);
        self.was_authenticated.store(true, Ordering::SeqCst);
    }

    pub async fn current_lease(&self) -> Option<SessionLease> {
        self.current.lock().await.clone()
    }

    /// One validation pass. Returns whether the session is usable.
    ///
    /// A process that never authenticated is deliberately left alone so
    /// startup races cannot produce a false expiry signal.
    pub async fn validate(&self) -> bool {
        if !self.was_authenticated.load(Ordering::SeqCst) {
            return true;
        }

        let lease = match self.backend.fetch_session().await {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                self.expire("auth backend returned no session").await;
                return false;
            }
            Err(e) => {
                self.expire(&format!("session fetch failed: {e}")).await;
                return false;
            }
        };

        let ttl = lease.seconds_to_expiry(Utc::now());

        if ttl < 0 {
            self.expire("session lease lapsed").await;
            return false;
        }

        if ttl < REFRESH_WINDOW_SECS {
            match self.backend.refresh(&lease.refresh_token).await {
                Ok(renewed) => {
                    tracing::debug!(
                        user_id = %renewed.user_id,
                        "session refreshed proactively"
                    );
                    *self.current.lock().await = Some(renewed);
                    self.emit(SessionEvent::Refreshed).await;
                }
                Err(e) => {
                    // The current token may still be valid for up to the
                    // refresh window; warn instead of forcing sign-out.
                    tracing::warn!(error = %e, "proactive session refresh failed");
                    *self.current.lock().await = Some(lease);
                    self.emit(SessionEvent::RefreshFailed {
                        reason: e.to_string(),
                    })
                    .await;
                }
            }
            return true;
        }

        *self.current.lock().await = Some(lease);
        true
    }

    /// Mirror a backend auth-state notification.
    pub async fn handle_auth_change(&self, change: AuthStateChange) {
        match change {
            AuthStateChange::SignedIn(lease) => self.mark_signed_in(lease).await,
            AuthStateChange::SignedOut => {
                if self.was_authenticated.load(Ordering::SeqCst) {
                    self.expire("backend reported sign-out").await;
                }
            }
        }
    }

    async fn expire(&self, reason: &str) {
        tracing::warn!(reason, "session expired");
        *self.current.lock().await = None;
        // Expiry fires once; re-authentication re-arms it.
        self.was_authenticated.store(false, Ordering::SeqCst);
        self.emit(SessionEvent::Expired).await;
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("session event receiver dropped");
        }
    }

    /// Start the background watchdog: one check after [`INITIAL_DELAY`],
    /// then every [`CHECK_INTERVAL`]. The returned handle stops the loop
    /// deterministically; dropping it has the same effect.
    pub fn spawn(self: &Arc<Self>) -> WatchdogHandle {
        let validator = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(INITIAL_DELAY) => {}
                _ = shutdown_rx.changed() => return,
            }
            validator.validate().await;

            let mut ticker = tokio::time::interval(CHECK_INTERVAL);
            ticker.tick().await; // consume the immediate first tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        validator.validate().await;
                    }
                    _ = shutdown_rx.changed() => return,
                }
            }
        });

        WatchdogHandle {
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }
}

pub struct WatchdogHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl WatchdogHandle {
    /// Stop the watchdog and wait for its task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
