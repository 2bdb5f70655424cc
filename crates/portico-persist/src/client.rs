use mongodb::Client;

use crate::builder::PersistClientBuilder;
use crate::error::{PersistError, Result};
use crate::repositories::{FeedbackRepository, LimitRepository};

pub struct PersistClient {
    limit_repo: LimitRepository,
    feedback_repo: FeedbackRepository,
}

impl PersistClient {
    pub fn builder() -> PersistClientBuilder {
        PersistClientBuilder::new()
    }

    pub async fn new(mongodb_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            limit_repo: LimitRepository::new(&client, db_name),
            feedback_repo: FeedbackRepository::new(&client, db_name),
        })
    }

    pub fn limits(&self) -> &LimitRepository {
        &self.limit_repo
    }

    pub fn feedback(&self) -> &FeedbackRepository {
        &self.feedback_repo
    }
}
