mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use legal_chat_service::config::ChatConfig;
use legal_chat_service::services::providers::mock::MockProvider;
use legal_chat_service::services::providers::GroundedAnswer;
use legal_chat_service::sources::{GroundingChunk, GroundingMetadata, WebReference};

fn web(uri: &str, title: &str) -> GroundingChunk {
    GroundingChunk {
        web: Some(WebReference {
            uri: Some(uri.to_string()),
            title: Some(title.to_string()),
            ..WebReference::default()
        }),
    }
}

fn grounded(chunks: Vec<GroundingChunk>) -> GroundedAnswer {
    GroundedAnswer {
        text: "Трудовий кодекс регулює трудові відносини.".to_string(),
        grounding: Some(GroundingMetadata {
            grounding_chunks: chunks,
            web_search_queries: vec!["кодекс законів про працю".to_string()],
        }),
    }
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/search?q=").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.provider.searches().is_empty());
}

#[tokio::test]
async fn missing_query_is_rejected() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/search").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn returns_answer_with_cleaned_sources() {
    let app = TestApp::new(MockProvider::new().with_search_answer(grounded(vec![
        web("https://zakon.rada.gov.ua/laws/show/322-08", "zakon.rada.gov.ua"),
        web("ftp://files.example.com/kzpp", "Archive"),
        web("https://court.gov.ua/news", "Судова влада України"),
    ])));

    let response = app.get("/api/search?q=%D0%9A%D0%97%D0%BF%D0%9F").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["answer"], "Трудовий кодекс регулює трудові відносини.");

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["url"], "https://zakon.rada.gov.ua/laws/show/322-08");
    assert_eq!(sources[1]["url"], "https://court.gov.ua/news");
    assert_eq!(
        app.provider.searches(),
        vec!["Find and summarize: КЗпП. Cite sources.".to_string()]
    );
}

#[tokio::test]
async fn limit_caps_the_source_count() {
    let app = TestApp::new(MockProvider::new().with_search_answer(grounded(vec![
        web("https://a.example.com/1", "A"),
        web("https://b.example.com/2", "B"),
        web("https://c.example.com/3", "C"),
    ])));

    let response = app.get("/api/search?q=law&limit=1").await;

    let body = body_json(response).await;
    assert_eq!(body["sources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_key_is_a_configuration_error() {
    let app = TestApp::with_config(ChatConfig::in_memory(), MockProvider::new());

    let response = app.get("/api/search?q=law").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Configuration error");
    assert_eq!(body["details"], "Missing GEMINI_API_KEY");
}

#[tokio::test]
async fn provider_failure_is_an_internal_error() {
    let app = TestApp::new(MockProvider::new().with_search_failure("upstream down"));

    let response = app.get("/api/search?q=law").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn non_numeric_limit_is_a_json_bad_request() {
    let app = TestApp::new(MockProvider::new());

    let response = app.get("/api/search?q=law&limit=many").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid query parameters"));
    assert!(app.provider.searches().is_empty());
}
