use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use portico_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use portico_types::QueryCategory;

/// Categorical routing of free-text questions. The guard consults this
/// once per unblocked request and bases everything after on the result.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<QueryCategory>;
}

const CLASSIFIER_PROMPT: &str = "\
You route questions for a corporate-banking portfolio assistant.\n\
Reply with exactly one word:\n\
business - customer portfolios, products, limits, scores, banking relationships\n\
technical - using the application itself: screens, filters, exports, settings\n\
out_of_context - anything unrelated to corporate banking or this application";

/// LLM-backed classifier over any [`ChatClient`].
pub struct LlmClassifier {
    chat: Arc<dyn ChatClient>,
}

impl LlmClassifier {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl QueryClassifier for LlmClassifier {
    async fn classify(&self, question: &str) -> Result<QueryCategory> {
        let request = ChatRequest::new(vec![
            Message::system(CLASSIFIER_PROMPT),
            Message::user(question),
        ])
        .with_options(ChatOptions::new().temperature(0.0).max_tokens(8));

        let response = self
            .chat
            .chat(request)
            .await
            .context("classifier call failed")?;

        let label = response.text().unwrap_or_default().to_string();

        // A confused classifier must not penalize users: unknown labels
        // are treated as in scope.
        Ok(QueryCategory::from_label(&label).unwrap_or_else(|| {
            tracing::warn!(label, "unrecognized classifier label, treating as in scope");
            QueryCategory::Business
        }))
    }
}
