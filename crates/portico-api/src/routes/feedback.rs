use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use portico_persist::FeedbackDocument;
use portico_types::FeedbackEntry;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Recent audit entries for human review.
pub async fn list_feedback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<FeedbackEntry>>, ApiError> {
    let entries = state
        .persist
        .feedback()
        .list_recent(params.limit)
        .await?
        .into_iter()
        .map(FeedbackDocument::into_entry)
        .collect();

    Ok(Json(entries))
}

/// Entries where no answer could be produced from the documentation.
pub async fn list_investigations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FeedbackEntry>>, ApiError> {
    let entries = state
        .persist
        .feedback()
        .list_needing_investigation()
        .await?
        .into_iter()
        .map(FeedbackDocument::into_entry)
        .collect();

    Ok(Json(entries))
}
