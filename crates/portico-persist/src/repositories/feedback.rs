use anyhow::Result as AnyResult;
use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::{Client, Collection};
use portico_guard::AuditSink;
use portico_types::FeedbackEntry;

use crate::error::Result;
use crate::models::FeedbackDocument;

#[derive(Clone)]
pub struct FeedbackRepository {
    collection: Collection<FeedbackDocument>,
}

impl FeedbackRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("assistant_feedback");
        Self { collection }
    }

    pub async fn append(&self, entry: FeedbackEntry) -> Result<()> {
        let document = FeedbackDocument::from_entry(entry);
        self.collection.insert_one(&document).await?;
        Ok(())
    }

    /// Most recent entries first, for the review surface.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<FeedbackDocument>> {
        let documents = self
            .collection
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }

    /// Entries flagged because no answer could be produced from the
    /// documentation.
    pub async fn list_needing_investigation(&self) -> Result<Vec<FeedbackDocument>> {
        let documents = self
            .collection
            .find(doc! { "needs_investigation": true })
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }
}

#[async_trait]
impl AuditSink for FeedbackRepository {
    async fn append(&self, entry: FeedbackEntry) -> AnyResult<()> {
        FeedbackRepository::append(self, entry).await?;
        Ok(())
    }
}
