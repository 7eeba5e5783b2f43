//! Integration tests for the Langbase client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use ethics_navi::config::{LangbaseConfig, PipeConfig, RequestConfig};
use ethics_navi::error::{DialogueError, LangbaseError};
use ethics_navi::langbase::{LangbaseClient, Message, PipeRequest, ReasoningEngine};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> LangbaseClient {
    create_client_with_timeout(base_url, 5000)
}

fn create_client_with_timeout(base_url: &str, timeout_ms: u64) -> LangbaseClient {
    let config = LangbaseConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    LangbaseClient::new(&config, RequestConfig { timeout_ms }).expect("Failed to create client")
}

fn sse_chunk(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": text}}]})
    )
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

#[cfg(test)]
mod pipe_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_pipe_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({"name": "completion-pipe", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "{\"is_complete\": false}",
                "threadId": "thread-123",
                "raw": {
                    "model": "claude-sonnet",
                    "usage": {
                        "prompt_tokens": 100,
                        "completion_tokens": 50,
                        "total_tokens": 150
                    }
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let response = client
            .call_pipe(PipeRequest::new(
                "completion-pipe",
                vec![Message::user("Conversation so far")],
            ))
            .await
            .expect("Pipe call should succeed");

        assert!(response.success);
        assert_eq!(response.completion, "{\"is_complete\": false}");
        assert_eq!(response.thread_id, Some("thread-123".to_string()));
    }

    #[tokio::test]
    async fn test_complete_returns_completion_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "synthesis document"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let text = client
            .complete("synthesis-pipe", vec![Message::user("summaries")])
            .await
            .unwrap();
        assert_eq!(text, "synthesis document");
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .complete("completion-pipe", vec![Message::user("x")])
            .await
            .unwrap_err();

        match err {
            LangbaseError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .complete("completion-pipe", vec![Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, LangbaseError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "completion": "late"}))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = create_client_with_timeout(&mock_server.uri(), 50);
        let err = client
            .complete("completion-pipe", vec![Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, LangbaseError::Timeout { timeout_ms: 50 }));
    }
}

#[cfg(test)]
mod streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_delivers_fragments_in_order() {
        let mock_server = MockServer::start().await;

        let body = [
            sse_chunk("What is "),
            sse_chunk("the patient's "),
            sse_chunk("prognosis?"),
            "data: [DONE]\n\n".to_string(),
        ]
        .concat();

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_partial_json(json!({"name": "dialogue-pipe", "stream": true})))
            .respond_with(sse_response(body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let stream = client
            .stream("dialogue-pipe", vec![Message::user("opening")])
            .await
            .unwrap();

        let mut fragments = Vec::new();
        let text = stream
            .collect(|f| fragments.push(f.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "What is the patient's prognosis?");
        assert_eq!(fragments, vec!["What is ", "the patient's ", "prognosis?"]);
    }

    #[tokio::test]
    async fn test_stream_preserves_multibyte_text() {
        let mock_server = MockServer::start().await;

        let body = [sse_chunk("予後は"), sse_chunk("いかがですか"), "data: [DONE]\n\n".to_string()].concat();

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(sse_response(body))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let text = client
            .stream("dialogue-pipe", vec![Message::user("opening")])
            .await
            .unwrap()
            .collect(|_| {})
            .await
            .unwrap();
        assert_eq!(text, "予後はいかがですか");
    }

    #[tokio::test]
    async fn test_stream_with_malformed_event_is_interrupted() {
        let mock_server = MockServer::start().await;

        let body = [sse_chunk("Partial "), "data: {broken\n\n".to_string()].concat();

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(sse_response(body))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .stream("dialogue-pipe", vec![Message::user("opening")])
            .await
            .unwrap()
            .collect(|_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DialogueError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn test_stream_closed_without_done_is_interrupted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(sse_response(sse_chunk("What is the pati")))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let mut seen = Vec::new();
        let err = client
            .stream("dialogue-pipe", vec![Message::user("opening")])
            .await
            .unwrap()
            .collect(|f| seen.push(f.to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, DialogueError::Interrupted { fragments: 1 }));
        assert_eq!(seen, vec!["What is the pati"]);
    }

    #[tokio::test]
    async fn test_stream_error_status_fails_before_streaming() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client
            .stream("dialogue-pipe", vec![Message::user("opening")])
            .await;
        assert!(matches!(result, Err(LangbaseError::Api { status: 401, .. })));
    }
}

#[cfg(test)]
mod pipe_provisioning_tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_interview_pipes_creates_three_pipes() {
        let mock_server = MockServer::start().await;
        let pipes = PipeConfig::default();

        for (name, temperature) in [
            (&pipes.dialogue, 0.7),
            (&pipes.completion, 0.0),
            (&pipes.synthesis, 0.0),
        ] {
            Mock::given(method("POST"))
                .and(path("/v1/pipes"))
                .and(body_partial_json(json!({"name": name, "temperature": temperature})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "name": name,
                    "description": "",
                    "status": "private",
                    "url": format!("https://langbase.com/pipes/{}", name),
                    "type": "chat"
                })))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let client = create_test_client(&mock_server.uri());
        client.ensure_interview_pipes(&pipes).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_pipe_accepts_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Pipe already exists"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        client
            .ensure_interview_pipes(&PipeConfig::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_pipe_propagates_other_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .ensure_interview_pipes(&PipeConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LangbaseError::Api { status: 403, .. }));
    }
}
