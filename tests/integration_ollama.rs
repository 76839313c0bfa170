#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Comparison runs against a mock Ollama server

use std::sync::Arc;
use std::time::Duration;

use chunk_eval::capability::{Capabilities, CapabilityMode, Embedder, Generator, OllamaClient};
use chunk_eval::config::{ComparisonConfig, OllamaConfig};
use chunk_eval::compare;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const EMBED_MODEL: &str = "test-embed";
const CHAT_MODEL: &str = "test-chat";

const DOCUMENT: &str = "Rust is a systems programming language focused on safety. The borrow \
    checker enforces ownership rules at compile time. Cargo is the package manager that builds \
    Rust projects. Crates are published to a central registry for reuse. Tea is a drink made \
    by steeping leaves in hot water. Green tea is produced without oxidising the leaves. Black \
    tea is fully oxidised before it is dried.";

/// Answers `/api/embed` with one topic vector per input
struct TopicEmbeddings;

impl Respond for TopicEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| {
                        let text = input.as_str().unwrap_or_default().to_lowercase();
                        let rust = ["rust", "borrow", "cargo", "crate", "compile"]
                            .iter()
                            .filter(|w| text.contains(*w))
                            .count();
                        let tea = ["tea", "leaves", "drink", "oxidis"]
                            .iter()
                            .filter(|w| text.contains(*w))
                            .count();
                        vec![rust as f32 + 0.1, tea as f32 + 0.1]
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn ollama_config(server: &MockServer) -> OllamaConfig {
    let uri = Url::parse(&server.uri()).expect("mock server uri should parse");
    OllamaConfig {
        host: uri.host_str().unwrap_or("127.0.0.1").to_string(),
        port: uri.port().unwrap_or(80),
        embedding_model: EMBED_MODEL.to_string(),
        generation_model: CHAT_MODEL.to_string(),
        batch_size: 8,
        ..OllamaConfig::default()
    }
}

fn capabilities_for(client: OllamaClient) -> Capabilities {
    let client = Arc::new(client);
    Capabilities::none()
        .with_timeout(Duration::from_secs(10))
        .with_embedder(Arc::clone(&client) as Arc<dyn Embedder>)
        .with_generator(client as Arc<dyn Generator>)
}

fn comparison_config() -> ComparisonConfig {
    ComparisonConfig {
        chunk_size_tokens: 32,
        overlap_tokens: 4,
        min_tokens: 10,
        max_tokens: 100,
        num_questions: 3,
        concurrency: 2,
        ..ComparisonConfig::default()
    }
}

async fn mount_models(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": EMBED_MODEL}, {"name": CHAT_MODEL}]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn comparison_with_healthy_server_uses_full_capabilities() {
    init_test_tracing();

    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(TopicEmbeddings)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "0.7",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&ollama_config(&server))
        .expect("client should be created")
        .with_retry_attempts(1);
    let checker = client.clone();
    tokio::task::spawn_blocking(move || checker.health_check())
        .await
        .expect("blocking task should join")
        .expect("health check should pass");

    let capabilities = capabilities_for(client);
    let report = compare(DOCUMENT, &comparison_config(), &capabilities)
        .await
        .expect("comparison should succeed");

    assert_eq!(report.capability_mode, CapabilityMode::Full);
    assert_eq!(report.capability_fallbacks, 0);
    assert!(!report.simulated);
    assert_eq!(report.questions.len(), 3);
    assert!(report.semantic.chunks.len() >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_server_degrades_without_failing_the_run() {
    init_test_tracing();

    let server = MockServer::start().await;
    mount_models(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&ollama_config(&server))
        .expect("client should be created")
        .with_retry_attempts(1);
    let capabilities = capabilities_for(client);

    let report = compare(DOCUMENT, &comparison_config(), &capabilities)
        .await
        .expect("capability failures are recovered");

    assert_eq!(report.capability_mode, CapabilityMode::Degraded);
    assert!(report.capability_fallbacks > 0);
    assert!(report.simulated);
    assert!(!report.questions.is_empty());
}
