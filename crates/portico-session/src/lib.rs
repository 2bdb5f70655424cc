pub mod backend;
pub mod error;
pub mod validator;

pub use backend::{AuthBackend, HttpAuthBackend};
pub use error::SessionError;
pub use validator::{
    AuthStateChange, SessionEvent, SessionValidator, WatchdogHandle, CHECK_INTERVAL,
    INITIAL_DELAY, REFRESH_WINDOW_SECS,
};
