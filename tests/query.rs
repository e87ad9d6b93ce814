//! Conversation-loop tests against a mock chat-completions endpoint.

use std::time::Duration;

use secrecy::SecretString;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use glint::types::{
    AssistantEvent, ContentBlock, ExecuteOptions, Message, MessageContent, ProviderMessage,
    ResultEvent,
};
use glint::{GlintProvider, ProviderConfig};

fn sse_body(payloads: &[&str]) -> String {
    let mut body: String = payloads.iter().map(|p| format!("data: {p}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(payloads: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(payloads), "text/event-stream")
}

fn provider(server: &MockServer) -> GlintProvider {
    let config = ProviderConfig::new(Some(SecretString::new("test-key".into())))
        .with_base_url(server.uri());
    GlintProvider::new(config)
}

fn options(dir: &TempDir) -> ExecuteOptions {
    ExecuteOptions::new("do the thing", "glm-4.5", dir.path().to_path_buf())
        .with_session_id("s-test")
}

async fn collect(provider: &GlintProvider, options: ExecuteOptions) -> Vec<ProviderMessage> {
    let mut rx = provider.execute_query(options);
    let mut messages = Vec::new();
    while let Some(message) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("query stalled")
    {
        messages.push(message);
    }
    messages
}

const STOP_TURN: &str =
    r#"{"choices":[{"delta":{"content":"done"},"finish_reason":"stop"}]}"#;

const TOOL_TURN: &[&str] = &[
    r#"{"choices":[{"delta":{"reasoning_content":"I should write the file."}}]}"#,
    r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"write_file","arguments":"{\"file_path\":\"out.txt\","}}]}}]}"#,
    r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"content\":\"hi\"}"}}]},"finish_reason":"tool_calls"}]}"#,
];

#[tokio::test]
async fn simple_completion_streams_and_terminates_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(sse_response(&[
            r#"{"choices":[{"delta":{"content":"Hello "}}]}"#,
            r#"{"choices":[{"delta":{"content":"world"},"finish_reason":"stop"}]}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    let text: String = messages
        .iter()
        .filter_map(ProviderMessage::as_text_delta)
        .collect();
    assert_eq!(text, "Hello world");

    assert!(messages.iter().all(|m| m.session_id() == "s-test"));
    let terminals = messages.iter().filter(|m| m.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(matches!(
        messages.last(),
        Some(ProviderMessage::Result {
            event: ResultEvent::Completed { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn tool_call_round_trip_executes_and_loops() {
    let server = MockServer::start().await;
    // First request: the model asks for a write_file call, with the
    // arguments split across two deltas. Second request: it stops.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(TOOL_TURN))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[STOP_TURN]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    // The tool actually ran.
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
        "hi"
    );

    // Announcement precedes the output, and the call completes.
    let tool_use = messages.iter().position(|m| {
        matches!(
            m,
            ProviderMessage::Assistant {
                event: AssistantEvent::ToolUse { .. },
                ..
            }
        )
    });
    let tool_output = messages.iter().position(|m| {
        matches!(
            m,
            ProviderMessage::Result {
                event: ResultEvent::ToolOutput { .. },
                ..
            }
        )
    });
    assert!(tool_use.unwrap() < tool_output.unwrap());
    assert!(messages.last().unwrap().is_terminal());

    // Reasoning deltas were surfaced too.
    assert!(messages.iter().any(|m| matches!(
        m,
        ProviderMessage::Assistant {
            event: AssistantEvent::ReasoningDelta { .. },
            ..
        }
    )));
}

#[tokio::test]
async fn rate_limit_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[STOP_TURN]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    assert!(matches!(
        messages.last(),
        Some(ProviderMessage::Result {
            event: ResultEvent::Completed { .. },
            ..
        })
    ));
}

#[tokio::test]
async fn server_errors_are_terminal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    assert_eq!(messages.len(), 1);
    let ProviderMessage::Error {
        message, terminal, ..
    } = &messages[0]
    else {
        panic!("expected terminal error, got {:?}", messages[0]);
    };
    assert!(*terminal);
    assert!(message.contains("500"));
}

#[tokio::test]
async fn pre_cancelled_query_emits_one_terminal_error_and_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[STOP_TURN]))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir).with_cancel(cancel)).await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_terminal());
    assert!(matches!(&messages[0], ProviderMessage::Error { .. }));
}

#[tokio::test]
async fn cancel_during_turn_emits_one_terminal_error_and_no_tools() {
    let server = MockServer::start().await;
    // The response stalls long enough for the cancel to land mid-flight;
    // the body would otherwise request a tool call.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(TOOL_TURN).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let delayed = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        delayed.cancel();
    });

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir).with_cancel(cancel)).await;

    let terminals = messages.iter().filter(|m| m.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(matches!(
        messages.last(),
        Some(ProviderMessage::Error { terminal: true, .. })
    ));
    // The pending tool call never executed.
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn history_images_are_described_for_non_vision_models() {
    let server = MockServer::start().await;
    // The vision fallback gets the image and answers non-streaming.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"model": "glm-4v-plus"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "a red square"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(sse_response(&[STOP_TURN]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let history = vec![Message::user(MessageContent::Blocks(vec![
        ContentBlock::text("what color is this?"),
        ContentBlock::image_base64("image/png", "QQ=="),
    ]))];
    let messages = collect(&provider(&server), options(&dir).with_history(history)).await;
    assert!(messages.last().unwrap().is_terminal());

    // The main request carries the description, never the raw image.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let main: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(main["model"], "glm-4.5");
    let body = main.to_string();
    assert!(body.contains("a red square"));
    assert!(!body.contains("image_url"));
}

#[tokio::test]
async fn incomplete_tool_call_is_dropped_not_executed() {
    let server = MockServer::start().await;
    // finish_reason says tool_calls, but the arguments never finish: the
    // entry must be discarded and the call must complete instead.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[
            r#"{"choices":[{"delta":{"content":"checking"}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"write_file","arguments":"{\"file_path\":"}}]},"finish_reason":"tool_calls"}]}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    assert!(!messages.iter().any(|m| matches!(
        m,
        ProviderMessage::Assistant {
            event: AssistantEvent::ToolUse { .. },
            ..
        }
    )));
    assert!(matches!(
        messages.last(),
        Some(ProviderMessage::Result {
            event: ResultEvent::Completed { .. },
            ..
        })
    ));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn turn_limit_aborts_with_terminal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(TOOL_TURN))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir).with_max_turns(1)).await;

    let ProviderMessage::Error {
        message, terminal, ..
    } = messages.last().unwrap()
    else {
        panic!("expected terminal error");
    };
    assert!(*terminal);
    assert!(message.contains("turn limit"));
}

#[tokio::test]
async fn failing_tool_reports_nonterminal_error_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read_file","arguments":"{\"file_path\":\"missing.txt\"}"}}]},"finish_reason":"tool_calls"}]}"#,
        ]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(&[STOP_TURN]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let messages = collect(&provider(&server), options(&dir)).await;

    // The tool failure is a non-terminal error; the loop went on to a
    // second turn and completed normally.
    let tool_errors: Vec<_> = messages
        .iter()
        .filter(|m| matches!(m, ProviderMessage::Error { terminal: false, .. }))
        .collect();
    assert_eq!(tool_errors.len(), 1);
    assert!(matches!(
        messages.last(),
        Some(ProviderMessage::Result {
            event: ResultEvent::Completed { .. },
            ..
        })
    ));
}
