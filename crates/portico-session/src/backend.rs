use async_trait::async_trait;
use portico_types::SessionLease;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;

use crate::error::{Result, SessionError};

/// Seam over the managed auth backend's session endpoints. The watchdog
/// only ever performs these three calls.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session state, `None` when the backend holds no session.
    async fn fetch_session(&self) -> Result<Option<SessionLease>>;

    /// Exchange a refresh token for a renewed lease.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionLease>;

    async fn sign_out(&self) -> Result<()>;
}

/// REST implementation against the managed backend's auth API.
pub struct HttpAuthBackend {
    http: reqwest::Client,
    base_url: String,
}

/// Session payload on the wire; timestamps are epoch seconds.
#[derive(Debug, Deserialize)]
struct SessionPayload {
    user_id: String,
    issued_at: i64,
    expires_at: i64,
    refresh_token: String,
}

impl From<SessionPayload> for SessionLease {
    fn from(payload: SessionPayload) -> Self {
        SessionLease::from_epoch(
            payload.user_id,
            payload.issued_at,
            payload.expires_at,
            payload.refresh_token,
        )
    }
}

impl HttpAuthBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&api_key)
                .map_err(|_| SessionError::Backend("invalid API key format".to_string()))?,
        );

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn fetch_session(&self) -> Result<Option<SessionLease>> {
        let response = self
            .http
            .get(format!("{}/auth/v1/session", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
            });
        }

        let payload: SessionPayload = response
            .json()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        Ok(Some(payload.into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionLease> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
            });
        }

        let payload: SessionPayload = response
            .json()
            .await
            .map_err(|e| SessionError::Malformed(e.to_string()))?;

        Ok(payload.into())
    }

    async fn sign_out(&self) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
