use anyhow::Result as AnyResult;
use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Duration, Utc};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use portico_guard::LimitStore;
use portico_types::LimitRecord;

use crate::error::{PersistError, Result};
use crate::models::LimitDocument;

#[derive(Clone)]
pub struct LimitRepository {
    collection: Collection<LimitDocument>,
}

impl LimitRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("assistant_limits");
        Self { collection }
    }

    pub async fn find_for_user(&self, user_id: &str) -> Result<Option<LimitDocument>> {
        let filter = doc! { "user_id": user_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Count one out-of-scope question for the user.
    ///
    /// Two atomic steps, each a single server-side conditional update:
    /// first try `$inc` against a still-open window; if no document
    /// matches, upsert a fresh window with count 1. Concurrent requests
    /// race only across the window boundary, where both outcomes are a
    /// fresh window with count 1.
    pub async fn record_out_of_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<LimitDocument> {
        let cutoff = bson::DateTime::from_chrono(now - window);

        let filter = doc! {
            "user_id": user_id,
            "window_start": { "$gt": cutoff },
        };
        let update = doc! { "$inc": { "out_of_context_count": 1 } };

        if let Some(updated) = self
            .collection
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?
        {
            return Ok(updated);
        }

        // No open window: reset (or create) the record.
        let filter = doc! { "user_id": user_id };
        let update = doc! {
            "$set": {
                "out_of_context_count": 1,
                "window_start": bson::DateTime::from_chrono(now),
            },
            "$setOnInsert": { "user_id": user_id, "blocked_until": null },
        };

        self.collection
            .find_one_and_update(filter, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| {
                PersistError::Internal(format!("upsert returned no document for user {user_id}"))
            })
    }

    pub async fn set_block(&self, user_id: &str, until: DateTime<Utc>) -> Result<()> {
        let filter = doc! { "user_id": user_id };
        let update = doc! {
            "$set": { "blocked_until": bson::DateTime::from_chrono(until) },
        };

        self.collection.update_one(filter, update).await?;
        Ok(())
    }
}

#[async_trait]
impl LimitStore for LimitRepository {
    async fn fetch(&self, user_id: &str) -> AnyResult<Option<LimitRecord>> {
        let document = self.find_for_user(user_id).await?;
        Ok(document.map(LimitDocument::into_record))
    }

    async fn record_out_of_context(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AnyResult<LimitRecord> {
        let document = LimitRepository::record_out_of_context(self, user_id, now, window).await?;
        Ok(document.into_record())
    }

    async fn set_block(&self, user_id: &str, until: DateTime<Utc>) -> AnyResult<()> {
        LimitRepository::set_block(self, user_id, until).await?;
        Ok(())
    }
}
