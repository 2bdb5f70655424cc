use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use portico_llm::LlmError;
use portico_persist::PersistError;
use serde_json::json;
use thiserror::Error;

/// Everything a handler can fail with; each variant resolves to a JSON
/// body with a human-readable message, never a crash.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("assistant access is paused until {until}")]
    Blocked { until: DateTime<Utc> },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Guard failures wrap the classifier's LLM error; recover the typed
    /// taxonomy when it is the root cause so rate limits still map to 429.
    pub fn from_guard(error: anyhow::Error) -> Self {
        match error.downcast::<LlmError>() {
            Ok(llm) => Self::Llm(llm),
            Err(other) => Self::Internal(other),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Llm(LlmError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            Self::Llm(LlmError::PaymentRequired) => StatusCode::PAYMENT_REQUIRED,
            Self::Llm(LlmError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Llm(LlmError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Llm(_) => StatusCode::BAD_GATEWAY,
            Self::Blocked { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Persist(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({ "error": self.to_string() });
        if let Self::Blocked { until } = &self {
            // The client surfaces the exact unblock time inline.
            body["blocked_until"] = json!(until);
        }

        (status, Json(body)).into_response()
    }
}
