#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama client tests. The mock-server tests always run; the real-server
// tests are ignored by default.
// Run them with: cargo test --test integration_ollama -- --ignored

use news_verdict::config::OllamaConfig;
use news_verdict::embeddings::embedder::{Embedder, FailurePolicy};
use news_verdict::embeddings::ollama::OllamaClient;
use news_verdict::retrieval::{Verdict, parse_verdict};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBEDDING_MODEL: &str = "all-minilm";
const GENERATION_MODEL: &str = "llama3.2";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

fn mock_client(server: &MockServer) -> OllamaClient {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: server.address().port(),
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_retry_attempts(2)
}

fn real_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);

    let config = OllamaConfig {
        host,
        port,
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(120)) // Generation on CPU can be slow
        .with_retry_attempts(3)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_server_error_is_retried() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.0, 2.0]]
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let vector = tokio::task::spawn_blocking(move || {
        client.generate_embedding(EMBEDDING_MODEL, "retry me")
    })
    .await
    .expect("task should not panic")
    .expect("second attempt should succeed");

    assert_eq!(vector, vec![0.0, 2.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn legacy_embedding_field_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [1.0, 1.0, 1.0]
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let vector = tokio::task::spawn_blocking(move || {
        client.generate_embedding(EMBEDDING_MODEL, "legacy")
    })
    .await
    .expect("task should not panic")
    .expect("legacy response should parse");

    assert_eq!(vector.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedder_normalizes_server_vectors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[3.0, 4.0]]
        })))
        .mount(&server)
        .await;

    let embedder = Embedder::new(Arc::new(mock_client(&server)), EMBEDDING_MODEL)
        .with_max_workers(3)
        .with_failure_policy(FailurePolicy::FailFast);

    let texts: Vec<String> = (0..6).map(|i| format!("article {}", i)).collect();
    let vectors = embedder.embed(&texts).await.expect("batch should embed");

    assert_eq!(vectors.len(), 6);
    for vector in &vectors {
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_shaped_generation_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "Verdict: FAKE\nReason: no source reports it"}
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let response = tokio::task::spawn_blocking(move || {
        client.generate_completion(GENERATION_MODEL, "prompt")
    })
    .await
    .expect("task should not panic")
    .expect("generation should succeed");

    let report = parse_verdict(&response);
    assert_eq!(report.verdict, Verdict::Fake);
    assert_eq!(report.reason, "no source reports it");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_fails_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "all-minilm:latest"}]
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server);
    let result = tokio::task::spawn_blocking(move || {
        client.health_check(&[EMBEDDING_MODEL, GENERATION_MODEL])
    })
    .await
    .expect("task should not panic");

    let error = result.expect_err("generation model is not installed");
    assert!(format!("{:#}", error).contains(GENERATION_MODEL));
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = real_client();

    info!("Testing health check against real Ollama instance");
    let result = client.health_check(&[EMBEDDING_MODEL, GENERATION_MODEL]);

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let models = real_client().list_models().expect("models listed");
    assert!(
        !models.is_empty(),
        "Should have at least one model available"
    );

    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_embeddings_rank_related_text_higher() {
    init_test_tracing();

    let embedder = Embedder::new(Arc::new(real_client()), EMBEDDING_MODEL);
    let texts = vec![
        "the senate approved the federal budget after a long debate".to_string(),
        "lawmakers passed the government spending bill on friday".to_string(),
        "a recipe for chocolate cake with strawberries".to_string(),
    ];

    let vectors = embedder.embed(&texts).await.expect("embeddings generated");
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[0].len(), 384, "all-minilm produces 384 dimensions");

    let related = cosine_similarity(&vectors[0], &vectors[1]);
    let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
    info!("related={:.4} unrelated={:.4}", related, unrelated);
    assert!(related > unrelated);
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_generation_follows_format() {
    init_test_tracing();

    let prompt = news_verdict::retrieval::build_prompt(
        "the senate passed the budget bill",
        "[2021-03-03] (1): the senate passed the budget bill on wednesday",
    );
    let response = real_client()
        .generate_completion(GENERATION_MODEL, &prompt)
        .expect("completion generated");

    debug!("Model response: {}", response);
    assert!(!response.trim().is_empty());
    assert!(!parse_verdict(&response).reason.is_empty());
}
