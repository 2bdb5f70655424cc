use thiserror::Error;

/// Normalized taxonomy for everything that can go wrong talking to an AI
/// backend. Transport failures map onto a small fixed set so call sites
/// can surface a precise message without inspecting provider payloads.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider account out of credit")]
    PaymentRequired,

    #[error("provider rejected the API key")]
    InvalidCredentials,

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
