//! HTTP client tests against a local mock server.

use futures::StreamExt;
use serde_json::json;
use streamchat_ai::{
    AiError, CancellationController, ChatRequest, ChatTransport, ClientConfig, HistoryMessage,
    HttpChatClient, RequestState, RetryPolicy, StreamEvent,
};
use std::sync::Arc;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn disable_system_proxy_for_tests() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        // Safety: set once for the process before any HTTP clients are built.
        unsafe {
            std::env::set_var("STREAMCHAT_DISABLE_SYSTEM_PROXY", "1");
        }
    });
}

fn client_for(server: &MockServer) -> HttpChatClient {
    disable_system_proxy_for_tests();
    let policy = RetryPolicy {
        max_retries: 2,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
    };
    HttpChatClient::new(ClientConfig::default().with_base_url(server.uri()))
        .unwrap()
        .with_retry_policy(policy)
}

fn sse_body(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("{line}\n\n"))
        .collect::<String>()
}

#[tokio::test]
async fn test_stream_decodes_fragments_and_done() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"data: {"type":"assistant","reply":"Hi"}"#,
        r#"data: {"type":"assistant","reply":" there"}"#,
        "data: {broken",
        r#"data: {"type":"assistant","reply":"!"}"#,
        "data: [DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("x-request-source", "streamchat"))
        .and(body_partial_json(json!({
            "session_id": "s-1",
            "user_input": "hello",
            "history": [{ "role": "assistant", "content": "Welcome" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = ChatRequest::new("s-1", "hello")
        .with_history(vec![HistoryMessage::assistant("Welcome")]);

    let events: Vec<StreamEvent> = client
        .open_stream(&request)
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("Hi".to_string()),
            StreamEvent::Fragment(" there".to_string()),
            StreamEvent::Fragment("!".to_string()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_http_error_uses_error_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "user_input is empty" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.open_stream(&ChatRequest::new("s-1", "")).await;

    match result {
        Err(AiError::Http {
            status, message, ..
        }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "user_input is empty");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an HTTP error"),
    }
}

#[tokio::test]
async fn test_server_error_is_retried_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                sse_body(&[r#"data: {"reply":"ok"}"#, "data: [DONE]"]),
                "text/event-stream",
            ),
        )
        .with_priority(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let events: Vec<StreamEvent> = client
        .open_stream(&ChatRequest::new("s-1", "hi"))
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![StreamEvent::Fragment("ok".to_string()), StreamEvent::Done]
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stop_posts_session_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stop"))
        .and(body_json(json!({ "session_id": "s-9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "stopped" })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).stop("s-9").await.unwrap();
}

#[tokio::test]
async fn test_list_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "id": "deepseek-ai/deepseek-moe-16b-chat",
                    "name": "DeepSeek Chat",
                    "description": "general"
                },
                { "id": "qwen", "name": "Qwen" }
            ]
        })))
        .mount(&server)
        .await;

    let models = client_for(&server).list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].label(), "DeepSeek Chat - general");
    assert_eq!(models[1].description, None);
}

#[tokio::test]
async fn test_controller_end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse_body(&[
                r#"data: {"type":"assistant","reply":"Hi"}"#,
                r#"data: {"type":"assistant","reply":" there"}"#,
                r#"data: {"type":"assistant","reply":"!"}"#,
                "data: [DONE]",
            ]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut controller = CancellationController::new(Arc::new(client_for(&server)));
    let outcome = controller
        .start(ChatRequest::new("s-1", "hello"))
        .unwrap()
        .wait()
        .await;

    assert_eq!(outcome.state, RequestState::Completed);
    assert_eq!(outcome.text, "Hi there!");
}
