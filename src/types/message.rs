//! Conversation message types.
//!
//! Messages follow the OpenAI-compatible chat-completions shape used by the
//! GLM API: a `role`, a `content` that is either a string or an ordered list
//! of content parts, and for assistant messages an optional list of tool
//! calls plus the model's `reasoning_content`. The reasoning text is carried
//! verbatim across turns — dropping it silently changes model behavior.

use serde::{Deserialize, Serialize};

use super::content::ContentBlock;

/// The author of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The caller's prompt.
    User,
    /// Model output.
    Assistant,
    /// A tool execution result, correlated by `tool_call_id`.
    Tool,
}

/// Message content: a plain string or ordered content blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Ordered multimodal content blocks.
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Returns the text content, flattening block lists into their text parts.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier correlating the call with its result message.
    pub id: String,

    /// Always "function" on the wire.
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,

    /// The function name and raw JSON arguments.
    pub function: FunctionCall,
}

fn function_call_type() -> String {
    "function".to_string()
}

/// The function half of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    /// The tool name.
    pub name: String,
    /// The arguments as a raw JSON string.
    pub arguments: String,
}

impl ToolCall {
    /// Creates a new tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The message author.
    pub role: Role,

    /// The message content.
    pub content: MessageContent,

    /// Preserved thinking text from the model, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    /// Tool calls requested by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// For tool-role messages: the id of the call this answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            reasoning_content: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning_content: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a plain assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning_content: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates an assistant message carrying tool calls and reasoning.
    #[must_use]
    pub fn assistant_with_tools(
        content: impl Into<MessageContent>,
        reasoning_content: Option<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning_content,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    /// Creates a tool-result message answering the given call id.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            reasoning_content: None,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_text_content_round_trip() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
        assert!(json.get("tool_calls").is_none());

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_tool_call_wire_shape() {
        let call = ToolCall::new("call_1", "read_file", r#"{"file_path":"a.txt"}"#);
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "read_file");
        assert_eq!(json["function"]["arguments"], r#"{"file_path":"a.txt"}"#);
    }

    #[test]
    fn test_assistant_with_tools_omits_empty_list() {
        let msg = Message::assistant_with_tools("", None, vec![]);
        assert!(msg.tool_calls.is_none());

        let msg = Message::assistant_with_tools("", None, vec![ToolCall::new("c", "t", "{}")]);
        assert_eq!(msg.tool_calls.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let msg = Message::tool("call_9", "output");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
    }

    #[test]
    fn test_reasoning_content_preserved() {
        let msg = Message::assistant_with_tools(
            "answer",
            Some("chain of thought".to_string()),
            vec![],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["reasoning_content"], "chain of thought");
    }

    #[test]
    fn test_blocks_content_as_text() {
        let content = MessageContent::Blocks(vec![
            super::super::content::ContentBlock::text("a"),
            super::super::content::ContentBlock::image_base64("image/png", "QQ=="),
            super::super::content::ContentBlock::text("b"),
        ]);
        assert_eq!(content.as_text(), "a\nb");
    }
}
