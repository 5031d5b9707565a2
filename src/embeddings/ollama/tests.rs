use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OllamaClient {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        timeout_seconds: 10,
        retry_attempts: 4,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 4);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn embed_response_shapes() {
    let current = parse_embed_response(r#"{"model":"m","embeddings":[[0.1,0.2,0.3]]}"#)
        .expect("current shape parses");
    assert_eq!(current, vec![0.1, 0.2, 0.3]);

    let legacy = parse_embed_response(r#"{"embedding":[1.0,2.0]}"#).expect("legacy shape parses");
    assert_eq!(legacy, vec![1.0, 2.0]);

    assert!(parse_embed_response(r#"{"embeddings":[]}"#).is_err());
    assert!(parse_embed_response(r#"{"other":1}"#).is_err());
    assert!(parse_embed_response("not json").is_err());
}

#[test]
fn generate_response_shapes() {
    let completion = parse_generate_response(r#"{"model":"m","response":"Verdict: TRUE","done":true}"#)
        .expect("completion shape parses");
    assert_eq!(completion, "Verdict: TRUE");

    let chat = parse_generate_response(
        r#"{"message":{"role":"assistant","content":"Verdict: FAKE"}}"#,
    )
    .expect("chat shape parses");
    assert_eq!(chat, "Verdict: FAKE");

    let bare = parse_generate_response(r#""Verdict: TRUE""#).expect("bare string parses");
    assert_eq!(bare, "Verdict: TRUE");

    assert!(parse_generate_response(r#"{"done":true}"#).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_through_http_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "all-minilm", "input": "hello world"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "all-minilm",
            "embeddings": [[3.0, 4.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let vector = tokio::task::spawn_blocking(move || client.embed("all-minilm", "hello world"))
        .await
        .expect("task should not panic")
        .expect("embedding should succeed");

    assert_eq!(vector, vec![3.0, 4.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn generates_through_http_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({"model": "llama3.2", "prompt": "p", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2",
            "response": "Verdict: FAKE\nReason: invented",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = tokio::task::spawn_blocking(move || client.generate("llama3.2", "p"))
        .await
        .expect("task should not panic")
        .expect("generation should succeed");

    assert_eq!(text, "Verdict: FAKE\nReason: invented");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_surface_as_service_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.embed("all-minilm", "text"))
        .await
        .expect("task should not panic");

    assert!(matches!(result, Err(VerdictError::Service(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(3);
    let result = tokio::task::spawn_blocking(move || client.generate("missing", "p"))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_validates_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "all-minilm:latest", "size": 45000000},
                {"name": "llama3.2:latest"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let (healthy, missing) = tokio::task::spawn_blocking(move || {
        (
            client.health_check(&["all-minilm", "llama3.2:latest"]),
            client.health_check(&["mistral"]),
        )
    })
    .await
    .expect("task should not panic");

    assert!(healthy.is_ok());
    assert!(missing.is_err());
}
