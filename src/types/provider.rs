//! Messages emitted to the caller during a query.
//!
//! `execute_query` yields an ordered sequence of these; emission order
//! matches generation order and consumers must not assume buffering or
//! reordering. Every message carries the session id for correlation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message emitted by the provider while a query runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderMessage {
    /// Partial assistant output.
    Assistant {
        /// Correlation id for this call.
        session_id: String,
        /// The assistant event payload.
        event: AssistantEvent,
    },

    /// A tool output or the final completion.
    Result {
        /// Correlation id for this call.
        session_id: String,
        /// The result payload.
        event: ResultEvent,
    },

    /// A failure. Terminal errors end the call; per-tool errors do not.
    Error {
        /// Correlation id for this call.
        session_id: String,
        /// Human-readable description.
        message: String,
        /// True when the call stops after this message.
        terminal: bool,
    },
}

/// Incremental assistant output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// A fragment of response text.
    TextDelta {
        /// The text fragment.
        text: String,
    },

    /// A fragment of thinking text.
    ReasoningDelta {
        /// The reasoning fragment.
        text: String,
    },

    /// Announcement that a tool is about to run.
    ToolUse {
        /// The tool call id.
        id: String,
        /// The tool name.
        name: String,
        /// Parsed tool arguments.
        arguments: Value,
    },
}

/// A completed result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultEvent {
    /// Output of one tool execution.
    ToolOutput {
        /// The tool call this answers.
        tool_call_id: String,
        /// The tool's output text.
        output: String,
    },

    /// The final completion for the call.
    Completed {
        /// The assistant's full response text for the last turn.
        text: String,
    },
}

impl ProviderMessage {
    /// Returns true if this message ends the call.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Error { terminal, .. } => *terminal,
            Self::Result { event, .. } => matches!(event, ResultEvent::Completed { .. }),
            Self::Assistant { .. } => false,
        }
    }

    /// Returns the session id this message belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Assistant { session_id, .. }
            | Self::Result { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    /// Extracts the text fragment if this is a text delta.
    #[must_use]
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::Assistant {
                event: AssistantEvent::TextDelta { text },
                ..
            } => Some(text),
            _ => None,
        }
    }
}
