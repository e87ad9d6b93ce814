//! The multi-turn tool-calling conversation loop.
//!
//! One `execute_query` call runs as one sequential task: request a streaming
//! model turn, emit text and reasoning deltas as they arrive, assemble tool
//! calls from indexed fragments, execute the complete calls in order, append
//! the results as tool-role messages, and loop until the model stops or the
//! turn budget runs out. Cancellation (the caller's token combined with a
//! hard deadline) is observed at every suspension point and produces exactly
//! one terminal error message.

use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::client::{ApiClient, ChatRequest, ThinkingWire};
use super::sse::{SseEvent, StreamParser};
use super::{deadline_token, vision, ApiError, QUERY_DEADLINE};
use crate::config::{ConfigReport, InstallationStatus, ProviderConfig};
use crate::models::{find_model, ModelDefinition, MODELS};
use crate::tools::{filtered_tools, ToolChoice, ToolExecutor};
use crate::types::{
    AssistantEvent, CompletedToolCall, ContentBlock, ExecuteOptions, FinishReason,
    MessageContent, ProviderMessage, ResultEvent, ToolCall, ToolCallAccumulator,
};
use crate::types::{Message, Prompt};

/// Bound on in-flight provider messages; applies backpressure to the loop
/// when the consumer falls behind.
const CHANNEL_CAPACITY: usize = 64;

/// The GLM provider adapter. Holds only read-only configuration; each query
/// runs with call-local state.
#[derive(Clone)]
pub struct GlintProvider {
    config: ProviderConfig,
}

impl GlintProvider {
    /// Creates a provider from explicit configuration.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Creates a provider configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ProviderConfig::from_env())
    }

    /// Returns the static model catalog.
    #[must_use]
    pub fn available_models(&self) -> &'static [ModelDefinition] {
        MODELS
    }

    /// Capability check by feature name.
    #[must_use]
    pub fn supports_feature(&self, name: &str) -> bool {
        crate::models::supports_feature(name)
    }

    /// Validates the configuration without network access.
    #[must_use]
    pub fn validate_config(&self) -> ConfigReport {
        self.config.validate()
    }

    /// Reports installation status without network access.
    #[must_use]
    pub fn detect_installation(&self) -> InstallationStatus {
        self.config.detect_installation()
    }

    /// Runs a query, returning a live, single-pass sequence of
    /// [`ProviderMessage`]s in generation order. The sequence ends with
    /// exactly one terminal message: a final completion or a terminal error.
    #[must_use]
    pub fn execute_query(&self, options: ExecuteOptions) -> mpsc::Receiver<ProviderMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let config = self.config.clone();

        tokio::spawn(async move {
            let emitter = Emitter { tx, session_id };
            if let Err(e) = run_conversation(&config, options, &emitter).await {
                info!(error = %e, "query ended with terminal error");
                emitter.error(e.to_string(), true).await;
            }
        });

        rx
    }
}

/// Sends provider messages tagged with the session id. Send failures mean
/// the consumer dropped the receiver; emission methods return false and the
/// loop winds down quietly.
struct Emitter {
    tx: mpsc::Sender<ProviderMessage>,
    session_id: String,
}

impl Emitter {
    async fn send(&self, message: ProviderMessage) -> bool {
        self.tx.send(message).await.is_ok()
    }

    async fn text_delta(&self, text: &str) -> bool {
        self.send(ProviderMessage::Assistant {
            session_id: self.session_id.clone(),
            event: AssistantEvent::TextDelta {
                text: text.to_string(),
            },
        })
        .await
    }

    async fn reasoning_delta(&self, text: &str) -> bool {
        self.send(ProviderMessage::Assistant {
            session_id: self.session_id.clone(),
            event: AssistantEvent::ReasoningDelta {
                text: text.to_string(),
            },
        })
        .await
    }

    async fn tool_use(&self, call: &CompletedToolCall) -> bool {
        self.send(ProviderMessage::Assistant {
            session_id: self.session_id.clone(),
            event: AssistantEvent::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        })
        .await
    }

    async fn tool_output(&self, tool_call_id: &str, output: &str) -> bool {
        self.send(ProviderMessage::Result {
            session_id: self.session_id.clone(),
            event: ResultEvent::ToolOutput {
                tool_call_id: tool_call_id.to_string(),
                output: output.to_string(),
            },
        })
        .await
    }

    async fn completed(&self, text: String) -> bool {
        self.send(ProviderMessage::Result {
            session_id: self.session_id.clone(),
            event: ResultEvent::Completed { text },
        })
        .await
    }

    async fn error(&self, message: String, terminal: bool) -> bool {
        self.send(ProviderMessage::Error {
            session_id: self.session_id.clone(),
            message,
            terminal,
        })
        .await
    }
}

async fn run_conversation(
    config: &ProviderConfig,
    options: ExecuteOptions,
    emitter: &Emitter,
) -> Result<(), ApiError> {
    let client = ApiClient::new(config)?;
    let (cancel, _watcher) = deadline_token(&options.cancel, QUERY_DEADLINE);
    // Dropping the guard on return cancels the token and ends the watcher.
    let _deadline_guard = cancel.clone().drop_guard();
    let executor = ToolExecutor::new(options.working_dir.clone());

    let model = find_model(&options.model);
    let supports_vision = model.is_some_and(|m| m.supports_vision);
    let supports_thinking = model.is_some_and(|m| m.supports_thinking);

    let prompt_content = prepare_prompt(&options.prompt, supports_vision, &client, &cancel).await?;

    let mut messages = vec![Message::system(build_system_text(&options))];
    messages.extend(prepare_history(&options.history, supports_vision, &client, &cancel).await?);
    messages.push(Message::user(prompt_content));

    let tools = filtered_tools(options.allowed_tools.as_deref());

    for turn in 0..options.max_turns {
        debug!(turn, messages = messages.len(), "starting model turn");

        let request = ChatRequest {
            model: &options.model,
            messages: &messages,
            tools: tools.clone(),
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some(ToolChoice::Auto)
            },
            stream: true,
            temperature: 0.7,
            thinking: options
                .thinking
                .as_ref()
                .filter(|_| supports_thinking)
                .map(ThinkingWire::from),
            response_format: options
                .structured_output
                .then(|| json!({"type": "json_object"})),
        };

        let response = client.stream_chat(&request, &cancel).await?;
        let Some(outcome) = drive_stream(response, &cancel, emitter).await? else {
            return Ok(());
        };

        if outcome.finish == Some(FinishReason::ToolCalls) && !outcome.calls.is_empty() {
            let wire_calls: Vec<ToolCall> = outcome
                .calls
                .iter()
                .map(|c| ToolCall::new(c.id.as_str(), c.name.as_str(), c.arguments_json.as_str()))
                .collect();
            messages.push(Message::assistant_with_tools(
                outcome.text,
                outcome.reasoning,
                wire_calls,
            ));

            // Sequential execution keeps result ordering deterministic
            // relative to the model's call order.
            for call in &outcome.calls {
                if cancel.is_cancelled() {
                    return Err(ApiError::Cancelled);
                }
                if !emitter.tool_use(call).await {
                    return Ok(());
                }

                let result = executor.execute(&call.name, &call.arguments).await;
                messages.push(Message::tool(call.id.as_str(), result.text()));

                let delivered = if result.is_error() {
                    emitter.error(result.text().to_string(), false).await
                } else {
                    emitter.tool_output(&call.id, result.text()).await
                };
                if !delivered {
                    return Ok(());
                }
            }
            continue;
        }

        // Stop, length, or tool_calls whose every entry was dropped as
        // incomplete: the turn produced no executable calls, so the call
        // completes with whatever text was streamed.
        emitter.completed(outcome.text).await;
        return Ok(());
    }

    Err(ApiError::TurnLimit {
        turns: options.max_turns,
    })
}

/// Builds the system message: resolved prompt, working-directory note, and
/// the structured-output instruction when requested.
fn build_system_text(options: &ExecuteOptions) -> String {
    let mut text = options.system_prompt.resolve().to_string();
    text.push_str(&format!(
        "\n\nWorking directory: {}",
        options.working_dir.display()
    ));
    if options.structured_output {
        text.push_str("\n\nRespond with a single valid JSON object and nothing else.");
    }
    text
}

/// Converts the prompt into message content, describing images through the
/// vision model when the selected model cannot see them.
async fn prepare_prompt(
    prompt: &Prompt,
    supports_vision: bool,
    client: &ApiClient,
    cancel: &CancellationToken,
) -> Result<MessageContent, ApiError> {
    match prompt {
        Prompt::Text(text) => Ok(text.clone().into()),
        Prompt::Blocks(blocks) if supports_vision => Ok(MessageContent::Blocks(blocks.clone())),
        Prompt::Blocks(blocks) => describe_block_content(blocks, client, cancel).await,
    }
}

/// History messages get the same image handling as the prompt: for a
/// non-vision model, image blocks anywhere in the history are replaced with
/// a described-text rendering so they never reach the model untransformed.
async fn prepare_history(
    history: &[Message],
    supports_vision: bool,
    client: &ApiClient,
    cancel: &CancellationToken,
) -> Result<Vec<Message>, ApiError> {
    let mut prepared = Vec::with_capacity(history.len());
    for message in history {
        match &message.content {
            MessageContent::Blocks(blocks)
                if !supports_vision && blocks.iter().any(ContentBlock::is_image) =>
            {
                let mut described = message.clone();
                described.content = describe_block_content(blocks, client, cancel).await?;
                prepared.push(described);
            }
            _ => prepared.push(message.clone()),
        }
    }
    Ok(prepared)
}

/// Flattens content blocks into text, replacing image blocks with a
/// description from the vision fallback model.
async fn describe_block_content(
    blocks: &[ContentBlock],
    client: &ApiClient,
    cancel: &CancellationToken,
) -> Result<MessageContent, ApiError> {
    let text = blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n");
    let images: Vec<ContentBlock> = blocks
        .iter()
        .filter(|block| block.is_image())
        .cloned()
        .collect();
    if images.is_empty() {
        return Ok(text.into());
    }
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    let description = vision::describe_images(client, &images, cancel).await?;
    Ok(format!("[Description of attached image(s)]\n{description}\n\n{text}").into())
}

/// Everything one streaming turn produced.
struct TurnOutcome {
    text: String,
    reasoning: Option<String>,
    finish: Option<FinishReason>,
    calls: Vec<CompletedToolCall>,
}

/// Drives one streaming response to completion, emitting deltas as they
/// arrive. Returns `None` when the consumer dropped the receiver. The
/// response body is dropped on every exit path, releasing the connection.
async fn drive_stream(
    response: reqwest::Response,
    cancel: &CancellationToken,
    emitter: &Emitter,
) -> Result<Option<TurnOutcome>, ApiError> {
    let mut stream = response.bytes_stream();
    let mut parser = StreamParser::new();
    let mut accumulator = ToolCallAccumulator::new();
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut finish = None;

    'stream: loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(ApiError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;

        for event in parser.push(&chunk) {
            match event {
                SseEvent::Done => break 'stream,
                SseEvent::Delta(delta) => {
                    if let Some(fragment) = &delta.text {
                        text.push_str(fragment);
                        if !emitter.text_delta(fragment).await {
                            return Ok(None);
                        }
                    }
                    if let Some(fragment) = &delta.reasoning {
                        reasoning.push_str(fragment);
                        if !emitter.reasoning_delta(fragment).await {
                            return Ok(None);
                        }
                    }
                    for fragment in &delta.tool_calls {
                        accumulator.apply(fragment);
                    }
                    if let Some(reason) = delta.finish_reason {
                        finish = Some(reason);
                    }
                }
            }
        }
    }

    let calls = accumulator.finalize();
    if finish == Some(FinishReason::ToolCalls) && calls.is_empty() {
        warn!("turn finished with tool_calls but no complete calls survived");
    }

    Ok(Some(TurnOutcome {
        text,
        reasoning: if reasoning.is_empty() {
            None
        } else {
            Some(reasoning)
        },
        finish,
        calls,
    }))
}
