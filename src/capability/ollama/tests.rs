use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OllamaConfig {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    OllamaConfig {
        protocol: "http".to_string(),
        host: uri.host_str().unwrap_or("127.0.0.1").to_string(),
        port: uri.port().unwrap_or(80),
        embedding_model: "test-embed".to_string(),
        generation_model: "test-chat".to_string(),
        batch_size: 2,
        ..OllamaConfig::default()
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server))
        .expect("should create client")
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "embed-model".to_string(),
        generation_model: "chat-model".to_string(),
        batch_size: 128,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.embedding_model, "embed-model");
    assert_eq!(client.generation_model, "chat-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0);

    // Zero attempts would never issue a request
    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_splits_requests_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-embed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    let embeddings = Embedder::embed_batch(&client, &texts)
        .await
        .expect("embedding should succeed");

    assert_eq!(embeddings.len(), 4);
    assert_eq!(embeddings[2], vec![1.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts = vec!["one".to_string(), "two".to_string()];
    let result = Embedder::embed_batch(&client, &texts).await;

    assert!(matches!(result, Err(CapabilityError::Request { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn complete_sends_generation_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "test-chat",
            "stream": false,
            "options": {"num_predict": 150}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Paris is the capital.",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let answer = client
        .complete("What is the capital?", &GenerationOptions::grounded())
        .await
        .expect("completion should succeed");

    assert_eq!(answer, "Paris is the capital.");
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
    let result = client
        .complete("prompt", &GenerationOptions::grading())
        .await;

    assert!(matches!(result, Err(CapabilityError::Request { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_both_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "test-embed"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("blocking task should join");

    assert!(result.is_err());
}
