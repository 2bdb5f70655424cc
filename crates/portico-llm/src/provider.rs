use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Logical AI backends the dispatcher knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    OpenRouter,
    /// Self-hosted OpenAI-compatible server; requires an explicit base URL.
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
            Self::Local => "local",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::Local => "llama3",
        }
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1/chat/completions"),
            Self::Groq => Some("https://api.groq.com/openai/v1/chat/completions"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1/chat/completions"),
            // No hosted endpoint exists; the user must supply one.
            Self::Local => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "openrouter" => Ok(Self::OpenRouter),
            "local" => Ok(Self::Local),
            other => Err(LlmError::Configuration(format!(
                "unknown provider '{other}'"
            ))),
        }
    }
}

/// User-supplied provider settings, rebuilt fresh for each dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,

    /// Overrides the provider's default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Absent keys are allowed; hosted providers will answer 401.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Only meaningful for `Local`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: None,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Collapse config plus the static default tables into exactly one
    /// endpoint and one model. Fails before any network I/O when the
    /// config cannot name a reachable backend.
    pub fn resolve(self) -> Result<ResolvedProvider, LlmError> {
        // base_url is only meaningful for local; hosted endpoints come
        // from the static table.
        let endpoint = match self.provider.default_endpoint() {
            Some(endpoint) => endpoint.to_string(),
            None => {
                let base = self.base_url.as_deref().ok_or_else(|| {
                    LlmError::Configuration("provider 'local' requires a base URL".to_string())
                })?;
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
        };

        let model = self
            .model
            .unwrap_or_else(|| self.provider.default_model().to_string());

        Ok(ResolvedProvider {
            kind: self.provider,
            endpoint,
            model,
            api_key: self.api_key,
        })
    }
}

/// A fully-determined backend: where to POST, which model, which key.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl ResolvedProvider {
    /// Header names/values the backend requires beyond bearer auth.
    /// OpenRouter wants attribution headers on every request.
    pub fn extra_headers(&self) -> &'static [(&'static str, &'static str)] {
        match self.kind {
            ProviderKind::OpenRouter => &[
                ("http-referer", "https://portico.app"),
                ("x-title", "Portico"),
            ],
            _ => &[],
        }
    }
}
