use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth backend rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("malformed session payload: {0}")]
    Malformed(String),

    #[error("auth backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
