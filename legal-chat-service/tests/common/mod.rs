#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use legal_chat_service::config::ChatConfig;
use legal_chat_service::services::providers::mock::MockProvider;
use legal_chat_service::services::{ChatStore, MemoryStore};
use legal_chat_service::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_API_KEY: &str = "test-gemini-key";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
}

impl TestApp {
    pub fn new(provider: MockProvider) -> Self {
        let mut config = ChatConfig::in_memory();
        config.gemini.api_key = TEST_API_KEY.to_string();
        Self::with_config(config, provider)
    }

    pub fn with_config(config: ChatConfig, provider: MockProvider) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let state = AppState::new(config, store.clone(), provider.clone());
        Self {
            state,
            store,
            provider,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router()
            .oneshot(request)
            .await
            .expect("Router failed to respond")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub fn store(&self) -> &dyn ChatStore {
        self.store.as_ref()
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_string(response).await).expect("Body is not JSON")
}

/// Split a data stream body into `(code, payload)` pairs.
pub fn frames(body: &str) -> Vec<(String, Value)> {
    body.lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (code, payload) = line.split_once(':').expect("Frame without a type code");
            (
                code.to_string(),
                serde_json::from_str(payload).expect("Frame payload is not JSON"),
            )
        })
        .collect()
}

pub fn codes(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(code, _)| code.as_str()).collect()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
