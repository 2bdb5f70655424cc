pub mod builder;
pub mod client;
pub mod error;
pub mod models;
pub mod repositories;

pub use builder::PersistClientBuilder;
pub use client::PersistClient;
pub use error::PersistError;
pub use models::{FeedbackDocument, LimitDocument};
pub use repositories::{FeedbackRepository, LimitRepository};
