//! HTTP surface tests through the router, without binding a socket

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{agents, evidence, ProviderBehavior, ScriptedRanking, StaticProvider};
use hypothesis_lab::config::{
    Config, LLMConfig, LoggingConfig, RunConfig, SearchConfig, ServerConfig,
};
use hypothesis_lab::types::LLMProvider;
use hypothesis_lab::{create_router, AppState, Supervisor};

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
        },
        llm: LLMConfig {
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            openrouter_api_key: String::new(),
            groq_api_key: String::new(),
            default_provider: LLMProvider::OpenAI,
            default_model: "gpt-4o".to_string(),
            temperature: 0.7,
        },
        search: SearchConfig {
            serpapi_key: String::new(),
            scholar_enabled: false,
            light_enabled: false,
            google_api_key: String::new(),
            google_cx: String::new(),
            nasa_api_key: String::new(),
            arxiv_enabled: false,
            provider_priority: vec![],
            max_retries: 1,
            retry_delay_ms: 0,
            keyword_selection: true,
        },
        run: RunConfig::default(),
        logging: LoggingConfig {
            filter: None,
            log_dir: None,
        },
    }
}

fn app() -> axum::Router {
    let provider = StaticProvider::new(
        "scholar",
        ProviderBehavior::Snippets(vec!["Seed germination under simulated microgravity"]),
    );
    let supervisor = Supervisor::new(agents(ScriptedRanking::new(&[5.0, 6.0, 7.0])), evidence(vec![provider]));
    create_router(AppState {
        config: test_config(),
        supervisor: Arc::new(supervisor),
    })
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_run(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/runs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_lists_providers() {
    let (status, body) = send(Request::get("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["evidence_providers"], json!(["scholar"]));
}

#[tokio::test]
async fn test_run_defaults() {
    let (status, body) = send(Request::get("/api/runs/defaults").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["max_iterations"], 3);
    assert_eq!(body["evidence_query_strategy"], "hypothesis-derived");
    assert_eq!(body["plateau_window"], 2);
}

#[tokio::test]
async fn test_create_run_returns_run_result() {
    let (status, body) = send(post_run(json!({
        "topic": "effect of microgravity on seed germination",
        "config": { "max_iterations": 2, "evidence_query_strategy": "topic-only" }
    })))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop_reason"], "exhausted-iterations");
    let records = body["state"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["iteration"], 0);
    assert_eq!(records[1]["input_hypothesis"], records[0]["output_hypothesis"]);
    assert!(body["summary"].as_str().unwrap().contains("refinement 2"));
    assert!(body.get("failure").is_none());
}

#[tokio::test]
async fn test_create_run_uses_server_defaults_without_config() {
    let (status, body) = send(post_run(json!({ "topic": "seed germination" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["records"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_config_is_unprocessable() {
    let (status, body) = send(post_run(json!({
        "topic": "seed germination",
        "config": { "max_iterations": 0 }
    })))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "configuration");
    assert!(body["error"].as_str().unwrap().contains("max_iterations"));
}

#[tokio::test]
async fn test_blank_topic_is_unprocessable() {
    let (status, body) = send(post_run(json!({ "topic": "  " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "configuration");
}
