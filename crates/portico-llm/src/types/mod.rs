mod message;
mod tool;

pub use message::{Message, Role};
pub use tool::{Tool, ToolCall, ToolChoice};
