pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod traits;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::LlmError;
pub use provider::{ProviderConfig, ProviderKind, ResolvedProvider};
pub use traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, TokenUsage};
pub use types::{Message, Role, Tool, ToolCall, ToolChoice};
