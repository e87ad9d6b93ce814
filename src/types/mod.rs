//! Core types for the Glint provider adapter.

pub mod content;
pub mod message;
pub mod options;
pub mod provider;
pub mod stream;

pub use content::{ContentBlock, ImageSource};
pub use message::{FunctionCall, Message, MessageContent, Role, ToolCall};
pub use options::{ExecuteOptions, Prompt, SystemPrompt, ThinkingConfig};
pub use provider::{AssistantEvent, ProviderMessage, ResultEvent};
pub use stream::{
    CompletedToolCall, FinishReason, StreamDelta, ToolCallAccumulator, ToolCallFragment,
};
