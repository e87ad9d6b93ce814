//! Streaming delta types and the tool-call accumulator.
//!
//! A streaming turn delivers deltas that may each carry a text fragment, a
//! reasoning fragment, and/or indexed tool-call fragments. Fragments for one
//! call share a delta index; the id, name, and argument pieces arrive across
//! separate deltas and are reassembled here.
//!
//! A call is complete only when its id, its name, and a syntactically valid
//! JSON arguments buffer are all present. Anything less at stream end is
//! dropped, never executed.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Why the server ended the turn.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal end of turn.
    Stop,
    /// The model requested tool execution.
    ToolCalls,
    /// The response hit the token limit.
    Length,
    /// Any other reason the server may report.
    #[serde(other)]
    Other,
}

/// One decoded streaming delta.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    /// Response text fragment.
    pub text: Option<String>,
    /// Thinking text fragment.
    pub reasoning: Option<String>,
    /// Tool-call fragments keyed by delta index.
    pub tool_calls: Vec<ToolCallFragment>,
    /// Present on the delta that ends the turn.
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    /// Returns true if the delta carries no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.reasoning.is_none()
            && self.tool_calls.is_empty()
            && self.finish_reason.is_none()
    }
}

/// A fragment of one tool call. Every field except the index is optional
/// per delta.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallFragment {
    /// The stream index identifying which call this fragment extends.
    pub index: u32,
    /// Call id, usually present only on the first fragment.
    pub id: Option<String>,
    /// Function name, usually present only on the first fragment.
    pub name: Option<String>,
    /// A piece of the JSON arguments string.
    pub arguments: Option<String>,
}

/// A fully assembled, validated tool call ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    /// The call id.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
    /// The raw arguments string as received.
    pub arguments_json: String,
}

/// A call under assembly.
#[derive(Debug, Clone, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl PartialToolCall {
    fn apply(&mut self, fragment: &ToolCallFragment) {
        if let Some(id) = &fragment.id {
            self.id = Some(id.clone());
        }
        if let Some(name) = &fragment.name {
            self.name = Some(name.clone());
        }
        if let Some(arguments) = &fragment.arguments {
            self.arguments.push_str(arguments);
        }
    }

    fn into_completed(self) -> Option<CompletedToolCall> {
        let id = self.id?;
        let name = self.name?;
        let arguments: Value = serde_json::from_str(&self.arguments).ok()?;
        Some(CompletedToolCall {
            id,
            name,
            arguments,
            arguments_json: self.arguments,
        })
    }
}

/// Accumulates tool-call fragments for one streaming turn.
///
/// Scoped to a single turn; discarded after `finalize`. A `BTreeMap` keeps
/// calls in index order so execution order matches the model's call order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    entries: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no fragments have been applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies one fragment, creating the entry for its index if needed.
    pub fn apply(&mut self, fragment: &ToolCallFragment) {
        self.entries
            .entry(fragment.index)
            .or_default()
            .apply(fragment);
    }

    /// Consumes the accumulator, returning the complete calls in index order.
    ///
    /// Entries missing an id, a name, or valid JSON arguments are dropped
    /// with a warning.
    #[must_use]
    pub fn finalize(self) -> Vec<CompletedToolCall> {
        self.entries
            .into_iter()
            .filter_map(|(index, partial)| {
                let name = partial.name.clone();
                match partial.into_completed() {
                    Some(call) => Some(call),
                    None => {
                        warn!(
                            index,
                            tool = name.as_deref().unwrap_or("<unknown>"),
                            "dropping incomplete tool call at stream end"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}
