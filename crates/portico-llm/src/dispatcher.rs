// Single-shot chat-completion dispatch over plain HTTP, no provider SDKs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::provider::{ProviderConfig, ResolvedProvider};
use crate::traits::{ChatClient, ChatRequest, ChatResponse, TokenUsage};
use crate::types::ToolCall;

/// Stateless pass-through to one resolved provider. No retries, no
/// backoff, no circuit breaking; callers that need resilience add it
/// themselves.
pub struct Dispatcher {
    http: reqwest::Client,
    provider: ResolvedProvider,
}

impl Dispatcher {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let provider = config.resolve()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &provider.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                    LlmError::Configuration("API key contains non-header characters".to_string())
                })?,
            );
        }
        for &(name, value) in provider.extra_headers() {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { http, provider })
    }

    pub fn provider(&self) -> &ResolvedProvider {
        &self.provider
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = serde_json::json!({
            "model": self.provider.model,
            "messages": &request.messages,
        });

        let obj = body.as_object_mut().unwrap();

        let options = &request.options;
        let reasoning_family = needs_completion_tokens_field(&self.provider.model);

        if let Some(temperature) = options.temperature {
            // Reasoning-family models reject the temperature parameter.
            if !reasoning_family {
                obj.insert("temperature".to_string(), serde_json::json!(temperature));
            }
        }
        if let Some(max_tokens) = options.max_tokens {
            let field = if reasoning_family {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            obj.insert(field.to_string(), serde_json::json!(max_tokens));
        }
        if let Some(tools) = &options.tools {
            obj.insert("tools".to_string(), serde_json::json!(tools));
        }
        if let Some(tool_choice) = &options.tool_choice {
            obj.insert("tool_choice".to_string(), serde_json::json!(tool_choice));
        }

        body
    }
}

/// Newer model families renamed the token cap and only accept the new
/// field name.
fn needs_completion_tokens_field(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("gpt-5")
}

/// Collapse a non-2xx status into the fixed error taxonomy.
fn error_for_status(status: u16, body: String) -> LlmError {
    match status {
        429 => LlmError::RateLimited,
        402 => LlmError::PaymentRequired,
        401 => LlmError::InvalidCredentials,
        _ => LlmError::Api { status, body },
    }
}

#[async_trait]
impl ChatClient for Dispatcher {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(&request);

        tracing::debug!(
            provider = %self.provider.kind,
            model = %self.provider.model,
            "dispatching chat completion"
        );

        let response = self
            .http
            .post(&self.provider.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), body));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response carried no choices".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
            usage: completion.usage,
            finish_reason: choice.finish_reason,
        })
    }
}

// ============================================================================
// WIRE TYPES (chat-completions response shape)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use crate::traits::ChatOptions;
    use crate::types::{Message, Tool, ToolChoice};

    fn dispatcher_for(model: &str) -> Dispatcher {
        let config = ProviderConfig::new(ProviderKind::OpenAi)
            .with_model(model)
            .with_api_key("test-key");
        Dispatcher::new(config).unwrap()
    }

    #[test]
    fn test_status_taxonomy() {
        assert!(matches!(error_for_status(429, String::new()), LlmError::RateLimited));
        assert!(matches!(error_for_status(402, String::new()), LlmError::PaymentRequired));
        assert!(matches!(error_for_status(401, String::new()), LlmError::InvalidCredentials));

        match error_for_status(500, "boom".to_string()) {
            LlmError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_rate_limited_distinct_from_transport() {
        let rate_limited = error_for_status(429, String::new());
        let transport = error_for_status(500, "internal".to_string());

        assert!(matches!(rate_limited, LlmError::RateLimited));
        assert!(!matches!(transport, LlmError::RateLimited));
    }

    #[test]
    fn test_body_uses_legacy_token_field() {
        let dispatcher = dispatcher_for("gpt-4o-mini");
        let request = ChatRequest::new(vec![Message::user("hi")])
            .with_options(ChatOptions::new().temperature(0.5).max_tokens(64));

        let body = dispatcher.build_body(&request);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("max_completion_tokens").is_none());
    }

    #[test]
    fn test_body_uses_completion_token_field_for_reasoning_models() {
        let dispatcher = dispatcher_for("o1-mini");
        let request = ChatRequest::new(vec![Message::user("hi")])
            .with_options(ChatOptions::new().temperature(0.5).max_tokens(64));

        let body = dispatcher.build_body(&request);
        assert_eq!(body["max_completion_tokens"], 64);
        assert!(body.get("max_tokens").is_none());
        // Temperature is dropped for this family.
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_body_carries_tools() {
        let dispatcher = dispatcher_for("gpt-4o-mini");
        let tools = vec![Tool::function(
            "lookup_customer",
            "Fetch a customer record",
            serde_json::json!({"type": "object", "properties": {}}),
        )];
        let request = ChatRequest::new(vec![Message::user("hi")])
            .with_options(ChatOptions::new().tools(tools).tool_choice(ToolChoice::auto()));

        let body = dispatcher.build_body(&request);
        assert_eq!(body["tools"][0]["function"]["name"], "lookup_customer");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_response_parsing() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        });

        let completion: ChatCompletion = serde_json::from_value(raw).unwrap();
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(completion.usage.as_ref().unwrap().total_tokens, 12);
    }

    #[test]
    fn test_response_usage_optional() {
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        });

        let completion: ChatCompletion = serde_json::from_value(raw).unwrap();
        assert!(completion.usage.is_none());
        assert!(completion.choices[0].finish_reason.is_none());
    }
}
