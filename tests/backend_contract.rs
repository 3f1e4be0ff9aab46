//! Chat backend contract tests.
//!
//! Verify the HTTP shape of both backend calls against a mock server:
//! - commands are posted to the chat endpoint as `{messages: [{content}]}`
//! - confirmations go to `<chat_url>/confirm-tool-call` with the original id
//! - non-2xx and non-JSON replies become errors, never panics

use callgate::backend::{ChatBackend, HttpChatBackend};
use callgate::config::BackendConfig;
use callgate::error::GateError;
use callgate::protocol::{ConversationResponse, classify, parse_tool_call_response};
use callgate::protocol::types::{ChatRequest, ConfirmRequest};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/api/users/u1/chats/c1";

fn backend_for(server: &MockServer) -> HttpChatBackend {
    let config = BackendConfig {
        chat_url: format!("{}{CHAT_PATH}", server.uri()),
        request_timeout_secs: Some(5),
    };
    HttpChatBackend::new(&config).expect("client")
}

fn pending_tool_call() -> serde_json::Value {
    json!({
        "verification_required": true,
        "tool_call": {
            "id": "call_42",
            "tool_name": "book_flight",
            "arguments": {"destination": {"city": "Paris"}}
        },
        "tool_hit": {"tool": "flights"},
        "message": [{"content": "book a flight", "role": "user"}]
    })
}

#[tokio::test]
async fn command_is_posted_as_message_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_json(json!({"messages": [{"content": "what's the weather"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Sunny."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let raw = backend
        .send_command(&ChatRequest::from_command("what's the weather"))
        .await
        .expect("request should succeed");

    assert_eq!(
        classify(&raw),
        ConversationResponse::Plain {
            text: "Sunny.".into()
        }
    );
}

#[tokio::test]
async fn confirmation_goes_to_confirm_path_with_original_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("{CHAT_PATH}/confirm-tool-call")))
        .and(body_partial_json(json!({
            "tool_call": {"id": "call_42", "tool_name": "book_flight"},
            "tool_hit": {"tool": "flights"},
            "updated_arguments": {"destination": {"city": "Paris"}},
            "messages": [{"content": "book a flight", "role": "user"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Booked."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let proposal = parse_tool_call_response(&pending_tool_call()).expect("valid proposal");
    let request = ConfirmRequest {
        updated_arguments: proposal.tool_call.arguments.clone(),
        tool_call: proposal.tool_call,
        tool_hit: proposal.tool_hit,
        messages: proposal.messages,
    };

    let backend = backend_for(&server);
    let raw = backend
        .confirm_tool_call(&request)
        .await
        .expect("confirm should succeed");
    assert_eq!(raw["choices"][0]["message"]["content"], json!("Booked."));
}

#[tokio::test]
async fn server_error_maps_to_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = backend_for(&server)
        .send_command(&ChatRequest::from_command("hi"))
        .await;

    match result {
        Err(GateError::Backend(message)) => {
            assert!(message.contains("500"), "message was: {message}");
            assert!(message.contains("boom"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_reply_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = backend_for(&server)
        .send_command(&ChatRequest::from_command("hi"))
        .await;
    assert!(matches!(result, Err(GateError::Backend(_))));
}

#[tokio::test]
async fn unreachable_backend_is_an_error() {
    let config = BackendConfig {
        chat_url: "http://127.0.0.1:9/chat".into(),
        request_timeout_secs: Some(2),
    };
    let backend = HttpChatBackend::new(&config).expect("client");
    let result = backend.send_command(&ChatRequest::from_command("hi")).await;
    assert!(matches!(result, Err(GateError::Backend(_))));
}
