use std::time::Duration;

use letterloop_client::{
    ClientError, ClientSettings, Credentials, ModelClient, ModelMode, ResilientClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/gemini-test:generateContent";

fn success_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ], "role": "model" } }
        ]
    })
}

fn client_for(server: &MockServer) -> ResilientClient {
    let settings = ClientSettings::default()
        .with_endpoint(format!("{}/v1beta", server.uri()))
        .with_lite_model("gemini-lite-test")
        .with_backoff_base(Duration::ZERO);
    ResilientClient::gemini(Credentials::new("test-key", "gemini-test"), settings).unwrap()
}

#[tokio::test]
async fn test_sends_prompt_and_system_instruction() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [ { "parts": [ { "text": "Write a letter" } ] } ],
            "systemInstruction": { "parts": [ { "text": "You are a consultant" } ] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Dear hiring team")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate("Write a letter", "You are a consultant")
        .await
        .unwrap();

    assert_eq!(text, "Dear hiring team");
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("done")))
        .mount(&server)
        .await;

    let text = client_for(&server)
        .invoke("prompt", None, ModelMode::Full)
        .await
        .unwrap();

    assert_eq!(text, "done");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_invalid_key_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .invoke("prompt", None, ModelMode::Full)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Rejected(_)));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .invoke("prompt", None, ModelMode::Full)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_lite_mode_targets_lite_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-lite-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("87")))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .invoke("sum the scores", None, ModelMode::Lite)
        .await
        .unwrap();

    assert_eq!(text, "87");
}

#[tokio::test]
async fn test_connection_failures_exhaust_retries() {
    let settings = ClientSettings::default()
        .with_endpoint("http://127.0.0.1:1/v1beta")
        .with_max_attempts(2)
        .with_backoff_base(Duration::ZERO)
        .with_request_timeout(Duration::from_secs(2));
    let client =
        ResilientClient::gemini(Credentials::new("test-key", "gemini-test"), settings).unwrap();

    let err = client
        .invoke("prompt", None, ModelMode::Full)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::RetriesExhausted { attempts: 2, .. }));
}
