//! Per-call execution options.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use super::content::ContentBlock;
use super::message::Message;

/// Default number of model turns before the loop aborts.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// System prompt used when the caller picks the built-in agent preset.
const CODING_AGENT_PRESET: &str = "You are a coding agent operating inside a \
sandboxed project directory. Use the provided tools to inspect and modify \
files and to run commands. Prefer small, verifiable steps. All file paths \
are relative to the working directory unless stated otherwise.";

/// The caller's prompt: plain text or ordered content blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Plain text prompt.
    Text(String),
    /// Ordered content blocks, possibly including images.
    Blocks(Vec<ContentBlock>),
}

impl Prompt {
    /// Returns true if any block is an image.
    #[must_use]
    pub fn has_images(&self) -> bool {
        match self {
            Self::Text(_) => false,
            Self::Blocks(blocks) => blocks.iter().any(ContentBlock::is_image),
        }
    }

    /// Splits the prompt into its text portion and its image blocks.
    #[must_use]
    pub fn split_text_and_images(&self) -> (String, Vec<ContentBlock>) {
        match self {
            Self::Text(text) => (text.clone(), Vec::new()),
            Self::Blocks(blocks) => {
                let text = blocks
                    .iter()
                    .filter_map(ContentBlock::as_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                let images = blocks
                    .iter()
                    .filter(|b| b.is_image())
                    .cloned()
                    .collect();
                (text, images)
            }
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// The system prompt: a literal string or a named preset.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemPrompt {
    /// Use the string verbatim.
    Literal(String),
    /// Use a named built-in preset.
    Preset(String),
}

impl SystemPrompt {
    /// Resolves the prompt to its final text.
    ///
    /// Unknown preset names fall back to the coding-agent preset.
    #[must_use]
    pub fn resolve(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Preset(_) => CODING_AGENT_PRESET,
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::Preset("coding_agent".to_string())
    }
}

/// Thinking-mode configuration forwarded to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingConfig {
    /// Whether extended thinking is requested.
    pub enabled: bool,
}

/// Immutable options for one `execute_query` call.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// The prompt for this call.
    pub prompt: Prompt,
    /// Model identifier (e.g. "glm-4.5").
    pub model: String,
    /// Working directory against which relative tool paths resolve.
    pub working_dir: PathBuf,
    /// System prompt or preset name.
    pub system_prompt: SystemPrompt,
    /// Maximum number of model turns before aborting.
    pub max_turns: usize,
    /// If set, only these tool names are offered to the model.
    pub allowed_tools: Option<Vec<String>>,
    /// Caller-supplied cancellation token.
    pub cancel: CancellationToken,
    /// Prior conversation turns supplied by the caller.
    pub history: Vec<Message>,
    /// Correlation id for emitted messages; generated when absent.
    pub session_id: Option<String>,
    /// Ask the model for a single JSON object response.
    pub structured_output: bool,
    /// Optional thinking-mode configuration.
    pub thinking: Option<ThinkingConfig>,
}

impl ExecuteOptions {
    /// Creates options with defaults for everything but the essentials.
    #[must_use]
    pub fn new(prompt: impl Into<Prompt>, model: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            working_dir,
            system_prompt: SystemPrompt::default(),
            max_turns: DEFAULT_MAX_TURNS,
            allowed_tools: None,
            cancel: CancellationToken::new(),
            history: Vec::new(),
            session_id: None,
            structured_output: false,
            thinking: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: SystemPrompt) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Sets the turn limit.
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Restricts the offered tools to the given names.
    #[must_use]
    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = Some(tools);
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Supplies prior conversation history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Sets the session correlation id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
