//! Unit tests for Langbase API types.
//!
//! Tests request/response serialization, streamed chunk decoding,
//! and builder patterns for Langbase pipe communication.

use super::*;
use serde_json::json;

#[test]
fn test_message_constructors() {
    let msg = Message::system("You are a clinical ethics facilitator");
    assert_eq!(msg.role, MessageRole::System);

    let msg = Message::user("The patient declines dialysis.");
    assert_eq!(msg.role, MessageRole::User);
    assert_eq!(msg.content, "The patient declines dialysis.");

    let msg = Message::assistant("What is the prognosis?");
    assert_eq!(msg.role, MessageRole::Assistant);
}

#[test]
fn test_pipe_request_defaults_to_blocking() {
    let req = PipeRequest::new("ethics-navi-completion-v1", vec![Message::user("check")]);
    assert_eq!(req.name, "ethics-navi-completion-v1");
    assert_eq!(req.messages.len(), 1);
    assert!(!req.stream);
    assert!(req.streaming().stream);
}

#[test]
fn test_pipe_request_serialize() {
    let req = PipeRequest::new("dialogue", vec![Message::user("hi")]).streaming();
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(
        value,
        json!({
            "name": "dialogue",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        })
    );
}

#[test]
fn test_pipe_response_deserialize() {
    let value = json!({
        "success": true,
        "completion": "{\"is_complete\": false}",
        "threadId": "thread-1",
        "raw": {
            "model": "claude-sonnet-4",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }
    });

    let resp: PipeResponse = serde_json::from_value(value).unwrap();
    assert!(resp.success);
    assert_eq!(resp.thread_id.as_deref(), Some("thread-1"));
    let usage = resp.raw.unwrap().usage.unwrap();
    assert_eq!(usage.total_tokens, Some(15));
}

#[test]
fn test_pipe_response_deserialize_minimal() {
    let resp: PipeResponse =
        serde_json::from_value(json!({"success": true, "completion": "ok"})).unwrap();
    assert_eq!(resp.completion, "ok");
    assert!(resp.thread_id.is_none());
    assert!(resp.raw.is_none());
}

#[test]
fn test_stream_chunk_text() {
    let chunk: StreamChunk =
        serde_json::from_value(json!({"choices": [{"delta": {"content": "Hello"}}]})).unwrap();
    assert_eq!(chunk.text(), Some("Hello"));

    let empty: StreamChunk = serde_json::from_value(json!({"choices": []})).unwrap();
    assert_eq!(empty.text(), None);

    let role_only: StreamChunk =
        serde_json::from_value(json!({"choices": [{"delta": {"role": "assistant"}}]})).unwrap();
    assert_eq!(role_only.text(), None);
}

#[test]
fn test_create_pipe_request_builder_chain() {
    let req = CreatePipeRequest::new("ethics-navi-synthesis-v1")
        .with_description("synthesis")
        .with_model("anthropic:claude-sonnet-4-20250514")
        .with_upsert(true)
        .with_json_output(true)
        .with_store(false)
        .with_temperature(0.0)
        .with_max_tokens(4096)
        .with_messages(vec![Message::system("prompt")]);

    assert_eq!(req.name, "ethics-navi-synthesis-v1");
    assert_eq!(req.upsert, Some(true));
    assert_eq!(req.json, Some(true));
    assert_eq!(req.store, Some(false));
    assert_eq!(req.max_tokens, Some(4096));
    assert!(req.stream.is_none());
    assert_eq!(req.messages.as_ref().map(Vec::len), Some(1));
}

#[test]
fn test_create_pipe_request_skips_unset_fields() {
    let req = CreatePipeRequest::new("bare");
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value, json!({"name": "bare"}));
}

#[test]
fn test_create_pipe_response_deserialize() {
    let value = json!({
        "name": "ethics-navi-dialogue-v1",
        "description": null,
        "status": "private",
        "owner_login": "clinic",
        "url": "https://langbase.com/clinic/ethics-navi-dialogue-v1",
        "type": "chat",
        "api_key": "pipe_key"
    });

    let resp: CreatePipeResponse = serde_json::from_value(value).unwrap();
    assert_eq!(resp.name, "ethics-navi-dialogue-v1");
    assert_eq!(resp.pipe_type, "chat");
}
