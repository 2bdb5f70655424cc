use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use portico_guard::Verdict;
use portico_llm::{ChatOptions, ChatRequest, Message, TokenUsage};
use portico_types::QueryCategory;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const ASSISTANT_PROMPT: &str = "\
You are the assistant of a corporate-banking portfolio application.\n\
Answer questions about customer portfolios, products, thresholds and\n\
scores, and about using the application, from the provided documentation.\n\
If the documentation does not cover the question, say so plainly.";

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub user_id: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: Option<String>,
    pub category: QueryCategory,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Screen the question, answer it when allowed, and audit the outcome.
pub async fn submit_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let verdict = state
        .guard
        .screen(&request.user_id, &request.question)
        .await
        .map_err(ApiError::from_guard)?;

    match verdict {
        Verdict::Blocked { until } => Err(ApiError::Blocked { until }),

        Verdict::OutOfScope { .. } => Ok(Json(QueryResponse {
            answer: None,
            category: QueryCategory::OutOfContext,
            warning: verdict.user_message(),
            usage: None,
        })),

        Verdict::Allowed { category } => {
            let chat_request = ChatRequest::new(vec![
                Message::system(ASSISTANT_PROMPT),
                Message::user(request.question.as_str()),
            ])
            .with_options(ChatOptions::new().temperature(0.2).max_tokens(800));

            let response = state.chat.chat(chat_request).await?;
            let answer = response.text().map(str::to_string);

            // An empty answer means the documentation did not cover the
            // question; flag it for review.
            let needs_investigation = answer.is_none();
            state
                .guard
                .record_answer(
                    &request.user_id,
                    &request.question,
                    answer.as_deref().unwrap_or(""),
                    category,
                    needs_investigation,
                )
                .await;

            Ok(Json(QueryResponse {
                answer,
                category,
                warning: None,
                usage: response.usage,
            }))
        }
    }
}
